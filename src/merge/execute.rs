//! Task execution - effectful operations
//!
//! Runs the steps produced by [`plan_task`] against the version-control and
//! hook boundaries. Every failure, including an `Err` from a boundary, ends
//! up as a [`MergeTaskResult`]; nothing escapes a task.

use crate::error::Result;
use crate::hook::{HookKind, HookRunner, TaskPaths, hook_env};
use crate::merge::plan::{
    MergeObservation, PlanOptions, TaskStep, apply_post_hook, classify_merge, plan_task,
    render_merge_branch,
};
use crate::process::CommandOutput;
use crate::report::{PR_URLS_FILE_NAME, PrUrlCollector};
use crate::tasklog::TaskLog;
use crate::template::Template;
use crate::types::{MergeTaskResult, RepoTaskSpec, TaskStatus};
use crate::vcs::Vcs;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Run-wide settings every task reads
#[derive(Debug, Clone, Default)]
pub struct TaskSettings {
    /// Root holding all checkouts
    pub repos_dir: PathBuf,
    /// This run's timestamped log directory
    pub run_dir: PathBuf,
    /// Merge-branch template, if any
    pub merge_branch_template: Option<Template>,
    /// Extra arguments for the merge command
    pub merge_options: Vec<String>,
    /// Pre-task hook command
    pub pre_hook: Option<String>,
    /// Post-task hook command
    pub post_hook: Option<String>,
    /// Prefix for hook environment variables
    pub env_prefix: String,
    /// Pull after checkout
    pub pull: bool,
}

impl TaskSettings {
    /// Paths for one repository
    pub fn paths_for(&self, repo_local_name: &str) -> TaskPaths {
        TaskPaths {
            repos_dir: self.repos_dir.clone(),
            repo_dir: self.repos_dir.join(repo_local_name),
            logs_dir: self.run_dir.clone(),
            pr_urls_file: self.run_dir.join(PR_URLS_FILE_NAME),
        }
    }

    /// Which optional steps tasks include
    pub const fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            pre_hook: self.pre_hook.is_some(),
            post_hook: self.post_hook.is_some(),
            pull: self.pull,
        }
    }
}

/// Everything a task needs, shared by all tasks of a run
pub struct TaskContext {
    /// Run-wide settings
    pub settings: TaskSettings,
    /// Version-control boundary
    pub vcs: Arc<dyn Vcs>,
    /// Hook boundary
    pub hooks: Arc<dyn HookRunner>,
    /// Shared pull-request URL file
    pub pr_urls: PrUrlCollector,
}

/// Status decision with the exit code and detail that led to it
#[derive(Debug, Clone)]
struct Outcome {
    status: TaskStatus,
    exit_code: Option<i32>,
    details: String,
}

impl Outcome {
    fn new(status: TaskStatus, exit_code: Option<i32>, details: impl Into<String>) -> Self {
        Self {
            status,
            exit_code,
            details: details.into(),
        }
    }

    fn from_command(status: TaskStatus, output: &CommandOutput, what: &str) -> Self {
        let reason = output
            .stderr
            .lines()
            .chain(output.stdout.lines())
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("no output");
        Self::new(status, output.exit_code, format!("{what}: {reason}"))
    }
}

/// Run one repository task to a terminal status (EFFECTFUL)
pub async fn execute_task(mut spec: RepoTaskSpec, ctx: &TaskContext) -> MergeTaskResult {
    let started = Local::now();
    spec.task_start_timestamp = Some(started);
    let paths = ctx.settings.paths_for(&spec.repo_local_name);

    let mut log = match TaskLog::create(&ctx.settings.run_dir, &spec.repo_local_name) {
        Ok(log) => log,
        Err(e) => {
            warn!(repo = %spec.repo_local_name, error = %e, "cannot create task log");
            let mut result = MergeTaskResult::unstarted(
                spec.repo_local_name.clone(),
                TaskStatus::Internal,
                format!("cannot create task log: {e}"),
            );
            fill_from_spec(&mut result, &spec, started);
            return result;
        }
    };

    log.line(&format!(
        "=== task begin: {} ({})",
        spec.repo_local_name,
        started.to_rfc3339()
    ));
    info!(repo = %spec.repo_local_name, "task started");

    let outcome = match run_steps(&mut spec, started, &paths, ctx, &mut log).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(repo = %spec.repo_local_name, error = %e, "task aborted");
            log.line(&format!("unexpected error: {e}"));
            Outcome::new(TaskStatus::Internal, None, e.to_string())
        }
    };

    let mut result = MergeTaskResult::unstarted(
        spec.repo_local_name.clone(),
        outcome.status,
        outcome.details,
    );
    fill_from_spec(&mut result, &spec, started);
    result.exit_code = outcome.exit_code;
    result.log_path = Some(log.path().to_path_buf());

    log.line(&format!(
        "=== task end: {} after {}",
        result.status,
        result.duration_display()
    ));
    log.json("Task result", &result);
    info!(
        repo = %result.repo_local_name,
        status = %result.status,
        duration = %result.duration_display(),
        "task finished"
    );
    result
}

fn fill_from_spec(result: &mut MergeTaskResult, spec: &RepoTaskSpec, started: DateTime<Local>) {
    result.source_ref.clone_from(&spec.source_ref);
    result.dest_branch.clone_from(&spec.dest_branch);
    result.merge_branch.clone_from(&spec.merge_branch_name);
    result.started_at = Some(started);
    result.finished_at = Some(Local::now());
}

async fn run_steps(
    spec: &mut RepoTaskSpec,
    started: DateTime<Local>,
    paths: &TaskPaths,
    ctx: &TaskContext,
    log: &mut TaskLog,
) -> Result<Outcome> {
    let settings = &ctx.settings;
    match render_merge_branch(settings.merge_branch_template.as_ref(), spec, started, paths) {
        Ok(name) => spec.merge_branch_name = name,
        Err(e) => {
            log.line(&format!("merge branch template: {e}"));
            return Ok(Outcome::new(TaskStatus::ConfigError, None, e.to_string()));
        }
    }
    log.json("Task spec", &*spec);

    let env = hook_env(&settings.env_prefix, spec, started, paths);
    let dir = paths.repo_dir.as_path();
    let vcs = ctx.vcs.as_ref();
    let mut outcome = Outcome::new(TaskStatus::Internal, None, "merge step did not run");

    for step in plan_task(spec, settings.plan_options()) {
        debug!(repo = %spec.repo_local_name, step = %step, "step");
        log.line(&format!("--- {step}"));

        match &step {
            TaskStep::PreHook => {
                let out = run_hook(ctx, HookKind::Pre, &env, log).await?;
                if !out.success() {
                    return Ok(Outcome::from_command(
                        TaskStatus::HookFailed,
                        &out,
                        "pre-task hook failed",
                    ));
                }
            }
            TaskStep::Reset | TaskStep::Clean => {
                if !vcs.is_repository(dir) {
                    log.line(&format!("{} is not a repository", dir.display()));
                    return Ok(Outcome::new(
                        TaskStatus::RepoMissing,
                        None,
                        format!("{} is not a repository", dir.display()),
                    ));
                }
                let out = if step == TaskStep::Reset {
                    vcs.reset_hard(dir).await?
                } else {
                    vcs.clean(dir).await?
                };
                log.command(&out);
                if !out.success() {
                    return Ok(Outcome::from_command(
                        TaskStatus::RepoMissing,
                        &out,
                        "cannot reset workspace",
                    ));
                }
            }
            TaskStep::Checkout { branch } => {
                let out = vcs.checkout(dir, branch).await?;
                log.command(&out);
                if !out.success() {
                    return Ok(Outcome::from_command(
                        TaskStatus::MergeCommandFailed,
                        &out,
                        &format!("cannot check out {branch}"),
                    ));
                }
            }
            TaskStep::Pull => {
                let out = vcs.pull(dir).await?;
                log.command(&out);
                if !out.success() {
                    return Ok(Outcome::from_command(
                        TaskStatus::MergeCommandFailed,
                        &out,
                        "pull failed",
                    ));
                }
            }
            TaskStep::PrepareMergeBranch { name } => {
                if let Some(failed) = prepare_merge_branch(vcs, dir, name, log).await? {
                    return Ok(failed);
                }
            }
            TaskStep::Merge { source_ref } => {
                // The post hook still runs when the VCS boundary itself fails
                outcome = match merge(vcs, dir, source_ref, &settings.merge_options, log).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(repo = %spec.repo_local_name, error = %e, "merge step errored");
                        log.line(&format!("unexpected error: {e}"));
                        Outcome::new(TaskStatus::Internal, None, format!("merge {source_ref}: {e}"))
                    }
                };
            }
            TaskStep::PostHook => {
                let out = run_hook(ctx, HookKind::Post, &env, log).await?;
                collect_pr_urls(&ctx.pr_urls, &out, log);
                let status = apply_post_hook(outcome.status, out.success());
                if status != outcome.status {
                    outcome = Outcome::from_command(
                        status,
                        &out,
                        &format!("post-task hook failed (merge: {})", outcome.status),
                    );
                }
            }
        }
    }

    Ok(outcome)
}

/// Reuse the merge branch if it exists, otherwise create it from the
/// current head; `Some` carries the failure.
async fn prepare_merge_branch(
    vcs: &dyn Vcs,
    dir: &Path,
    name: &str,
    log: &mut TaskLog,
) -> Result<Option<Outcome>> {
    let exists = vcs.branch_exists(dir, name).await?;
    log.command(&exists);

    let out = if exists.success() {
        log.line(&format!("reusing existing branch {name}"));
        vcs.checkout(dir, name).await?
    } else {
        vcs.create_branch(dir, name).await?
    };
    log.command(&out);

    Ok((!out.success()).then(|| {
        Outcome::from_command(
            TaskStatus::MergeCommandFailed,
            &out,
            &format!("cannot prepare branch {name}"),
        )
    }))
}

async fn merge(
    vcs: &dyn Vcs,
    dir: &Path,
    source_ref: &str,
    options: &[String],
    log: &mut TaskLog,
) -> Result<Outcome> {
    let before = head(vcs, dir, log).await?;
    let out = vcs.merge(dir, source_ref, options).await?;
    log.command(&out);
    let status = vcs.status(dir).await?;
    log.command(&status);
    let after = head(vcs, dir, log).await?;

    let obs = MergeObservation {
        merge_succeeded: out.success(),
        head_changed: before != after,
        tree_clean: status.success() && status.stdout.trim().is_empty(),
    };
    let task_status = classify_merge(obs);
    debug!(?obs, status = %task_status, "merge classified");

    Ok(match task_status {
        TaskStatus::SuccessNoDiff => Outcome::new(task_status, out.exit_code, "already up to date"),
        TaskStatus::SuccessMerged => Outcome::new(task_status, out.exit_code, ""),
        TaskStatus::ConflictOrDirty => {
            let paths: Vec<&str> = status.stdout.lines().map(str::trim).take(5).collect();
            Outcome::new(
                task_status,
                out.exit_code,
                format!("unresolved changes after merge: {}", paths.join(", ")),
            )
        }
        _ => Outcome::from_command(task_status, &out, &format!("cannot merge {source_ref}")),
    })
}

async fn head(vcs: &dyn Vcs, dir: &Path, log: &mut TaskLog) -> Result<Option<String>> {
    let out = vcs.head_commit(dir).await?;
    log.command(&out);
    Ok(out.success().then(|| out.stdout.trim().to_string()))
}

async fn run_hook(
    ctx: &TaskContext,
    kind: HookKind,
    env: &[(String, String)],
    log: &mut TaskLog,
) -> Result<CommandOutput> {
    let command = match kind {
        HookKind::Pre => ctx.settings.pre_hook.as_deref(),
        HookKind::Post => ctx.settings.post_hook.as_deref(),
    };
    let Some(command) = command else {
        return Ok(CommandOutput {
            exit_code: Some(0),
            ..CommandOutput::default()
        });
    };

    log.line(&format!("{kind} hook begin"));
    let out = ctx.hooks.run_hook(command, env).await?;
    log.command(&out);
    log.line(&format!("{kind} hook end"));
    Ok(out)
}

fn collect_pr_urls(collector: &PrUrlCollector, out: &CommandOutput, log: &mut TaskLog) {
    match collector.scan(&out.combined()) {
        Ok(urls) => {
            for url in urls {
                log.line(&format!("pull request: {url}"));
            }
        }
        Err(e) => warn!(error = %e, "cannot record pull request URLs"),
    }
}
