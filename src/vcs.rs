//! Version-control boundary
//!
//! The core only looks at exit codes, the current head commit, and whether
//! the working tree is clean. Everything else is up to `git` itself,
//! including any merge drivers registered in the repository.

use crate::error::Result;
use crate::process::{CommandOutput, run_captured};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Version-control operations needed by one merge task
///
/// Every method returns the captured subprocess result; an `Err` means the
/// tool could not be started at all.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Whether `dir` holds a checkout this tool can operate on
    fn is_repository(&self, dir: &Path) -> bool;

    /// Discard local modifications to tracked files
    async fn reset_hard(&self, dir: &Path) -> Result<CommandOutput>;

    /// Remove untracked files and directories
    async fn clean(&self, dir: &Path) -> Result<CommandOutput>;

    /// Switch to an existing branch
    async fn checkout(&self, dir: &Path, branch: &str) -> Result<CommandOutput>;

    /// Fast-forward the current branch from its upstream
    async fn pull(&self, dir: &Path) -> Result<CommandOutput>;

    /// Exit code 0 iff a local branch with this name exists
    async fn branch_exists(&self, dir: &Path, branch: &str) -> Result<CommandOutput>;

    /// Create a branch at the current head and switch to it
    async fn create_branch(&self, dir: &Path, branch: &str) -> Result<CommandOutput>;

    /// Current head commit id on stdout
    async fn head_commit(&self, dir: &Path) -> Result<CommandOutput>;

    /// Merge `source_ref` into the current branch without opening an editor
    async fn merge(&self, dir: &Path, source_ref: &str, options: &[String])
    -> Result<CommandOutput>;

    /// Porcelain status; empty stdout means clean
    async fn status(&self, dir: &Path) -> Result<CommandOutput>;
}

/// [`Vcs`] backed by the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    /// Use the given git executable
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn git<I, S>(&self, dir: &Path, args: I) -> Result<CommandOutput>
    where
        I: IntoIterator<Item = S> + Send,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
        let mut cmd = Command::new(&self.program);
        cmd.arg("-C").arg(dir).args(&args);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.env("GIT_MERGE_AUTOEDIT", "no");

        let display = format!(
            "{} -C {} {}",
            self.program,
            dir.display(),
            args.join(" ")
        );
        run_captured(cmd, display).await
    }
}

#[async_trait]
impl Vcs for GitCli {
    fn is_repository(&self, dir: &Path) -> bool {
        dir.join(".git").exists()
    }

    async fn reset_hard(&self, dir: &Path) -> Result<CommandOutput> {
        self.git(dir, ["reset", "--hard"]).await
    }

    async fn clean(&self, dir: &Path) -> Result<CommandOutput> {
        self.git(dir, ["clean", "-fd"]).await
    }

    async fn checkout(&self, dir: &Path, branch: &str) -> Result<CommandOutput> {
        self.git(dir, ["checkout", branch]).await
    }

    async fn pull(&self, dir: &Path) -> Result<CommandOutput> {
        self.git(dir, ["pull", "--ff"]).await
    }

    async fn branch_exists(&self, dir: &Path, branch: &str) -> Result<CommandOutput> {
        let reference = format!("refs/heads/{branch}");
        self.git(dir, ["show-ref", "--verify", "--quiet", reference.as_str()])
            .await
    }

    async fn create_branch(&self, dir: &Path, branch: &str) -> Result<CommandOutput> {
        self.git(dir, ["checkout", "-b", branch]).await
    }

    async fn head_commit(&self, dir: &Path) -> Result<CommandOutput> {
        self.git(dir, ["rev-parse", "HEAD"]).await
    }

    async fn merge(
        &self,
        dir: &Path,
        source_ref: &str,
        options: &[String],
    ) -> Result<CommandOutput> {
        let mut args = vec!["merge".to_string(), "--no-edit".to_string()];
        args.extend(options.iter().cloned());
        args.push(source_ref.to_string());
        self.git(dir, args).await
    }

    async fn status(&self, dir: &Path) -> Result<CommandOutput> {
        self.git(dir, ["status", "--porcelain"]).await
    }
}
