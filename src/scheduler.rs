//! Concurrent task scheduler
//!
//! One tokio task per runnable repository, at most `jobs` of them past the
//! semaphore at a time. Results come back in descriptor order regardless of
//! completion order. A panic or abort in one task only affects that task's
//! result.

use crate::merge::{TaskContext, execute_task};
use crate::resolve::{Resolution, Resolved};
use crate::types::{MergeTaskResult, RepoTaskSpec, TaskStatus};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, warn};

/// Progress notifications from the scheduler
pub trait RunProgress: Send + Sync {
    /// A task acquired a worker slot and is starting
    fn on_task_started(&self, repo_local_name: &str);
    /// A task reached a terminal status
    fn on_task_finished(&self, result: &MergeTaskResult);
}

/// [`RunProgress`] that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl RunProgress for NoProgress {
    fn on_task_started(&self, _repo_local_name: &str) {}
    fn on_task_finished(&self, _result: &MergeTaskResult) {}
}

enum Slot {
    Done(MergeTaskResult),
    Running {
        spec: RepoTaskSpec,
        handle: JoinHandle<MergeTaskResult>,
    },
}

/// Run every runnable entry of `resolution` and collect one result per entry
///
/// Invalid entries become `ConfigError` results without running anything.
/// When `shutdown` completes first, unfinished tasks are aborted (their
/// subprocesses are killed) and reported as `Cancelled`; results of tasks
/// that already finished are kept.
pub async fn run_tasks<F>(
    resolution: Resolution,
    ctx: Arc<TaskContext>,
    jobs: usize,
    progress: Arc<dyn RunProgress>,
    shutdown: F,
) -> Vec<MergeTaskResult>
where
    F: Future<Output = ()>,
{
    let jobs = jobs.max(1);
    debug!(jobs, "scheduling tasks");
    let semaphore = Arc::new(Semaphore::new(jobs));

    let mut slots: Vec<Slot> = resolution
        .entries
        .into_iter()
        .map(|entry| match entry {
            Resolved::Invalid {
                raw_descriptor,
                repo_local_name,
                errors,
            } => {
                let details = format!("{}: {}", raw_descriptor, errors.join("; "));
                let result = MergeTaskResult::unstarted(
                    repo_local_name,
                    TaskStatus::ConfigError,
                    details,
                );
                progress.on_task_finished(&result);
                Slot::Done(result)
            }
            Resolved::Runnable(spec) => {
                let handle = tokio::spawn(run_one(
                    spec.clone(),
                    Arc::clone(&ctx),
                    Arc::clone(&semaphore),
                    Arc::clone(&progress),
                ));
                Slot::Running { spec, handle }
            }
        })
        .collect();

    let mut shutdown = std::pin::pin!(shutdown);
    let mut interrupted = false;
    let mut results = Vec::with_capacity(slots.len());

    for slot in &mut slots {
        let Slot::Running { spec, handle } = slot else {
            continue;
        };
        let joined = if interrupted {
            handle.abort();
            handle.await
        } else {
            tokio::select! {
                joined = &mut *handle => joined,
                () = &mut shutdown => {
                    warn!("interrupted, cancelling unfinished tasks");
                    interrupted = true;
                    handle.abort();
                    handle.await
                }
            }
        };
        let result = joined_result(spec, joined);
        if result.status == TaskStatus::Cancelled {
            progress.on_task_finished(&result);
        }
        *slot = Slot::Done(result);
    }

    for slot in slots {
        if let Slot::Done(result) = slot {
            results.push(result);
        }
    }
    results
}

async fn run_one(
    spec: RepoTaskSpec,
    ctx: Arc<TaskContext>,
    semaphore: Arc<Semaphore>,
    progress: Arc<dyn RunProgress>,
) -> MergeTaskResult {
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return MergeTaskResult::unstarted(
            spec.repo_local_name,
            TaskStatus::Internal,
            "worker pool closed",
        );
    };
    progress.on_task_started(&spec.repo_local_name);
    let result = execute_task(spec, &ctx).await;
    progress.on_task_finished(&result);
    result
}

fn joined_result(
    spec: &RepoTaskSpec,
    joined: Result<MergeTaskResult, JoinError>,
) -> MergeTaskResult {
    let (status, details) = match joined {
        Ok(result) => return result,
        Err(e) if e.is_cancelled() => (TaskStatus::Cancelled, "run interrupted".to_string()),
        Err(e) => {
            error!(repo = %spec.repo_local_name, error = %e, "task panicked");
            (TaskStatus::Internal, format!("task panicked: {e}"))
        }
    };
    let mut result = MergeTaskResult::unstarted(spec.repo_local_name.clone(), status, details);
    result.source_ref.clone_from(&spec.source_ref);
    result.dest_branch.clone_from(&spec.dest_branch);
    result
}
