//! Task planning - pure functions
//!
//! Which steps a task runs, and how command outcomes map to a status.
//! No I/O happens here, so every decision of the state machine can be
//! unit tested without a repository.

use crate::error::Result;
use crate::hook::TaskPaths;
use crate::template::{Namespace, Template};
use crate::types::{RepoTaskSpec, TaskStatus};
use chrono::{DateTime, Local};

/// One step of a merge task, in execution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStep {
    /// Run the pre-task hook
    PreHook,
    /// Discard local modifications
    Reset,
    /// Remove untracked files
    Clean,
    /// Switch to the dest branch
    Checkout {
        /// Dest branch
        branch: String,
    },
    /// Fast-forward the dest branch from upstream
    Pull,
    /// Reuse or create the merge branch
    PrepareMergeBranch {
        /// Merge-branch name
        name: String,
    },
    /// Merge the source ref into the current branch
    Merge {
        /// Source ref
        source_ref: String,
    },
    /// Run the post-task hook
    PostHook,
}

impl std::fmt::Display for TaskStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreHook => write!(f, "run pre-task hook"),
            Self::Reset => write!(f, "reset --hard"),
            Self::Clean => write!(f, "clean untracked files"),
            Self::Checkout { branch } => write!(f, "checkout {branch}"),
            Self::Pull => write!(f, "pull --ff"),
            Self::PrepareMergeBranch { name } => write!(f, "reuse or create branch {name}"),
            Self::Merge { source_ref } => write!(f, "merge {source_ref}"),
            Self::PostHook => write!(f, "run post-task hook"),
        }
    }
}

/// Inputs that decide which optional steps a task includes
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
    /// A pre-task hook is configured
    pub pre_hook: bool,
    /// A post-task hook is configured
    pub post_hook: bool,
    /// Pull after checkout
    pub pull: bool,
}

/// Steps for one task, in order
///
/// `spec.merge_branch_name` must already be rendered.
#[must_use]
pub fn plan_task(spec: &RepoTaskSpec, options: PlanOptions) -> Vec<TaskStep> {
    let mut steps = Vec::with_capacity(8);
    if options.pre_hook {
        steps.push(TaskStep::PreHook);
    }
    steps.push(TaskStep::Reset);
    steps.push(TaskStep::Clean);
    steps.push(TaskStep::Checkout {
        branch: spec.dest_branch.clone(),
    });
    if options.pull {
        steps.push(TaskStep::Pull);
    }
    if let Some(name) = spec.merge_branch_name.as_ref().filter(|n| !n.is_empty()) {
        steps.push(TaskStep::PrepareMergeBranch { name: name.clone() });
    }
    steps.push(TaskStep::Merge {
        source_ref: spec.source_ref.clone(),
    });
    if options.post_hook {
        steps.push(TaskStep::PostHook);
    }
    steps
}

/// Render the merge-branch name for a task
///
/// `None` without a template: the merge then lands directly on the dest
/// branch.
pub fn render_merge_branch(
    template: Option<&Template>,
    spec: &RepoTaskSpec,
    task_start: DateTime<Local>,
    paths: &TaskPaths,
) -> Result<Option<String>> {
    let Some(template) = template else {
        return Ok(None);
    };
    let ns = Namespace::for_task(spec, task_start)
        .with_path("repo_dir", &paths.repo_dir)
        .with_path("repos_dir", &paths.repos_dir)
        .with_path("logs_dir", &paths.logs_dir);
    template.render_branch_name(&ns).map(Some)
}

/// What the merge step observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeObservation {
    /// The merge command exited 0
    pub merge_succeeded: bool,
    /// `HEAD` moved during the merge
    pub head_changed: bool,
    /// `status --porcelain` printed nothing afterwards
    pub tree_clean: bool,
}

/// Map a merge observation to a status
///
/// A dirty tree always means conflict, even if the command exited 0. A
/// failing merge with a clean tree did not get far enough to conflict
/// (unknown ref, refusing unrelated histories, ...) and is reported as a
/// command failure instead.
#[must_use]
pub const fn classify_merge(obs: MergeObservation) -> TaskStatus {
    match (obs.merge_succeeded, obs.tree_clean, obs.head_changed) {
        (_, false, _) => TaskStatus::ConflictOrDirty,
        (true, true, false) => TaskStatus::SuccessNoDiff,
        (true, true, true) => TaskStatus::SuccessMerged,
        (false, true, _) => TaskStatus::MergeCommandFailed,
    }
}

/// Fold the post-task hook's exit into the merge status
///
/// A failing hook overrides every status, successes included.
#[must_use]
pub const fn apply_post_hook(status: TaskStatus, hook_succeeded: bool) -> TaskStatus {
    if hook_succeeded {
        status
    } else {
        TaskStatus::HookFailed
    }
}
