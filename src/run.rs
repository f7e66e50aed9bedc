//! One orchestrator run, end to end
//!
//! Preflight, resolve, schedule, aggregate. The CLI adds terminal output
//! and signal handling around [`execute_run`]; tests drive it directly with
//! mock boundaries.

use crate::config::{RunConfig, check_merge_drivers};
use crate::error::Result;
use crate::hook::HookRunner;
use crate::merge::{TaskContext, TaskSettings, TaskStep, plan_task, render_merge_branch};
use crate::report::{PR_URLS_FILE_NAME, PrUrlCollector, summarize, write_reports};
use crate::resolve::{Resolved, resolve_specs};
use crate::scheduler::{RunProgress, run_tasks};
use crate::types::{RepoTaskSpec, RunSummary};
use crate::vcs::Vcs;
use chrono::{DateTime, Local};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Run directory name format
pub const RUN_DIR_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Create `<logs_dir>/<YYYYmmdd-HHMMSS>`
///
/// A numeric suffix is added when a run already used this second.
pub fn create_run_dir(logs_dir: &Path, now: DateTime<Local>) -> Result<PathBuf> {
    std::fs::create_dir_all(logs_dir)?;
    let stamp = now.format(RUN_DIR_FORMAT).to_string();
    let mut candidate = logs_dir.join(&stamp);
    let mut n = 1;
    while candidate.exists() {
        candidate = logs_dir.join(format!("{stamp}-{n}"));
        n += 1;
    }
    std::fs::create_dir(&candidate)?;
    Ok(candidate)
}

/// Task settings derived from the run configuration
pub fn task_settings(config: &RunConfig, run_dir: &Path) -> TaskSettings {
    TaskSettings {
        repos_dir: config.repos_dir.clone(),
        run_dir: run_dir.to_path_buf(),
        merge_branch_template: config.merge_branch_template.clone(),
        merge_options: config.merge_options.clone(),
        pre_hook: config.pre_hook.clone(),
        post_hook: config.post_hook.clone(),
        env_prefix: config.env_prefix.clone(),
        pull: config.pull,
    }
}

/// Execute every task of a run and write the reports
///
/// Only the merge-driver preflight can fail the run as a whole; every
/// per-repository problem is a result in the returned summary.
pub async fn execute_run<F>(
    config: &RunConfig,
    run_dir: &Path,
    vcs: Arc<dyn Vcs>,
    hooks: Arc<dyn HookRunner>,
    progress: Arc<dyn RunProgress>,
    shutdown: F,
) -> Result<RunSummary>
where
    F: Future<Output = ()>,
{
    check_merge_drivers(&config.merge_drivers)?;

    let resolution = resolve_specs(&config.repos, &config.branch_defaults);
    let jobs = config.jobs_for(resolution.runnable_count());
    info!(
        repos = resolution.entries.len(),
        runnable = resolution.runnable_count(),
        jobs,
        run_dir = %run_dir.display(),
        "starting run"
    );

    let ctx = Arc::new(TaskContext {
        settings: task_settings(config, run_dir),
        vcs,
        hooks,
        pr_urls: PrUrlCollector::new(
            run_dir.join(PR_URLS_FILE_NAME),
            config.pr_url_pattern.clone(),
        ),
    });

    let results = run_tasks(resolution, Arc::clone(&ctx), jobs, progress, shutdown).await;
    let summary = summarize(run_dir, results, &ctx.pr_urls);
    if let Err(e) = write_reports(&summary) {
        warn!(error = %e, "cannot write run reports");
    }
    info!(
        failed = summary.failures().count(),
        total = summary.results.len(),
        "run finished"
    );
    Ok(summary)
}

/// What a run would do for one descriptor
#[derive(Debug, Clone)]
pub enum PlannedTask {
    /// Resolved; the steps it would run
    Ready {
        /// Resolved spec with the merge-branch name filled in
        spec: RepoTaskSpec,
        /// Steps in order
        steps: Vec<TaskStep>,
    },
    /// Would end as a configuration error
    Invalid {
        /// Descriptor as given
        raw_descriptor: String,
        /// Why
        details: String,
    },
}

/// Plan a run without touching any repository
///
/// Merge-branch names are rendered with `now` as the task start.
pub fn plan_run(config: &RunConfig, run_dir: &Path, now: DateTime<Local>) -> Vec<PlannedTask> {
    let settings = task_settings(config, run_dir);
    resolve_specs(&config.repos, &config.branch_defaults)
        .entries
        .into_iter()
        .map(|entry| match entry {
            Resolved::Invalid {
                raw_descriptor,
                errors,
                ..
            } => PlannedTask::Invalid {
                raw_descriptor,
                details: errors.join("; "),
            },
            Resolved::Runnable(mut spec) => {
                let paths = settings.paths_for(&spec.repo_local_name);
                spec.task_start_timestamp = Some(now);
                match render_merge_branch(
                    settings.merge_branch_template.as_ref(),
                    &spec,
                    now,
                    &paths,
                ) {
                    Ok(name) => {
                        spec.merge_branch_name = name;
                        let steps = plan_task(&spec, settings.plan_options());
                        PlannedTask::Ready { spec, steps }
                    }
                    Err(e) => PlannedTask::Invalid {
                        raw_descriptor: spec.raw_descriptor,
                        details: e.to_string(),
                    },
                }
            }
        })
        .collect()
}
