//! Pre-/post-task hooks
//!
//! A hook is a user-supplied shell command. It receives the task's resolved
//! configuration as environment variables and reports back only through
//! its exit code. The working directory is not changed to the checkout;
//! hooks use `<prefix>REPO_DIR` when they need it.

use crate::error::Result;
use crate::process::{CommandOutput, run_captured};
use crate::types::RepoTaskSpec;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::path::PathBuf;
use tokio::process::Command;

/// Default prefix for exported variables
pub const DEFAULT_ENV_PREFIX: &str = "FLEET_";

/// Which end of the task a hook runs at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Before the workspace is touched
    Pre,
    /// After the merge, regardless of its outcome
    Post,
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pre => write!(f, "pre-task"),
            Self::Post => write!(f, "post-task"),
        }
    }
}

/// Filesystem locations exported to hooks
#[derive(Debug, Clone)]
pub struct TaskPaths {
    /// Root holding all checkouts
    pub repos_dir: PathBuf,
    /// This task's checkout
    pub repo_dir: PathBuf,
    /// The run's timestamped log directory
    pub logs_dir: PathBuf,
    /// Shared append-only pull-request URL file
    pub pr_urls_file: PathBuf,
}

/// Runs hook commands
#[async_trait]
pub trait HookRunner: Send + Sync {
    /// Run `command` with `env` added to the inherited environment
    async fn run_hook(&self, command: &str, env: &[(String, String)]) -> Result<CommandOutput>;
}

/// [`HookRunner`] that hands the command string to the platform shell
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellHookRunner;

#[async_trait]
impl HookRunner for ShellHookRunner {
    async fn run_hook(&self, command: &str, env: &[(String, String)]) -> Result<CommandOutput> {
        let mut cmd = shell_command(command);
        cmd.envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        run_captured(cmd, command.to_string()).await
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(not(unix))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// Environment exported to a task's hooks
///
/// Optional fields are exported as empty strings so hooks can rely on every
/// variable being set.
pub fn hook_env(
    prefix: &str,
    spec: &RepoTaskSpec,
    task_start: DateTime<Local>,
    paths: &TaskPaths,
) -> Vec<(String, String)> {
    let var = |name: &str, value: String| (format!("{prefix}{name}"), value);
    vec![
        var("REPO_LOCAL_NAME", spec.repo_local_name.clone()),
        var("SOURCE_REF", spec.source_ref.clone()),
        var("DEST_BRANCH", spec.dest_branch.clone()),
        var(
            "REMOTE_PROJECT_AND_NAME",
            spec.remote_project_and_name.clone().unwrap_or_default(),
        ),
        var("RAW_DESCRIPTOR", spec.raw_descriptor.clone()),
        var("TASK_START", task_start.to_rfc3339()),
        var(
            "MERGE_BRANCH",
            spec.merge_branch_name.clone().unwrap_or_default(),
        ),
        var("REPO_DIR", paths.repo_dir.to_string_lossy().into_owned()),
        var("REPOS_DIR", paths.repos_dir.to_string_lossy().into_owned()),
        var("LOGS_DIR", paths.logs_dir.to_string_lossy().into_owned()),
        var(
            "PR_URLS_FILE",
            paths.pr_urls_file.to_string_lossy().into_owned(),
        ),
    ]
}
