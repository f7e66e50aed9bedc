//! Core types for fleet-merge

use chrono::{DateTime, Local, TimeDelta};
use serde::Serialize;
use std::path::PathBuf;

/// One repository's resolved configuration
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RepoTaskSpec {
    /// Name of the checkout directory under the repositories root
    pub repo_local_name: String,
    /// Branch, tag or commit to merge from
    pub source_ref: String,
    /// Branch to merge into
    pub dest_branch: String,
    /// Remote `project/repo`, only passed through to hooks
    pub remote_project_and_name: Option<String>,
    /// Descriptor exactly as given
    pub raw_descriptor: String,
    /// Set when the task starts
    pub task_start_timestamp: Option<DateTime<Local>>,
    /// Rendered merge-branch name, `None` merges directly into `dest_branch`
    pub merge_branch_name: Option<String>,
}

impl RepoTaskSpec {
    /// Branch the merge commit lands on
    pub fn target_branch(&self) -> &str {
        self.merge_branch_name.as_deref().unwrap_or(&self.dest_branch)
    }
}

/// Terminal status of one repository task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Merge succeeded, nothing new came in
    SuccessNoDiff,
    /// Merge succeeded and created new commits
    SuccessMerged,
    /// Unresolved conflicts or a dirty tree after the merge
    ConflictOrDirty,
    /// Checkout directory absent or unusable
    RepoMissing,
    /// Pre- or post-task hook exited nonzero
    HookFailed,
    /// A version-control command failed for reasons other than conflicts
    MergeCommandFailed,
    /// Descriptor, branch or template problem for this repository
    ConfigError,
    /// Unexpected failure inside the task
    Internal,
    /// Run was interrupted before the task finished
    Cancelled,
}

impl TaskStatus {
    /// Whether this status counts as a successful task
    pub const fn is_success(self) -> bool {
        matches!(self, Self::SuccessNoDiff | Self::SuccessMerged)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SuccessNoDiff => write!(f, "success (no diff)"),
            Self::SuccessMerged => write!(f, "success (merged)"),
            Self::ConflictOrDirty => write!(f, "conflict or dirty"),
            Self::RepoMissing => write!(f, "repo missing"),
            Self::HookFailed => write!(f, "hook failed"),
            Self::MergeCommandFailed => write!(f, "merge command failed"),
            Self::ConfigError => write!(f, "config error"),
            Self::Internal => write!(f, "internal error"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of one repository task
#[derive(Debug, Clone, Serialize)]
pub struct MergeTaskResult {
    /// Repository the result belongs to (may be empty for unparsable descriptors)
    pub repo_local_name: String,
    /// Terminal status
    pub status: TaskStatus,
    /// Exit code of the subprocess that decided the status, if any
    pub exit_code: Option<i32>,
    /// Per-task log file
    pub log_path: Option<PathBuf>,
    /// Resolved source ref (empty if unresolved)
    pub source_ref: String,
    /// Resolved dest branch (empty if unresolved)
    pub dest_branch: String,
    /// Merge branch used, if any
    pub merge_branch: Option<String>,
    /// Human-readable detail for non-success statuses
    pub details: String,
    /// When the task started
    pub started_at: Option<DateTime<Local>>,
    /// When the task finished
    pub finished_at: Option<DateTime<Local>>,
}

impl MergeTaskResult {
    /// Result for a task that never got to run
    pub fn unstarted(
        repo_local_name: impl Into<String>,
        status: TaskStatus,
        details: impl Into<String>,
    ) -> Self {
        Self {
            repo_local_name: repo_local_name.into(),
            status,
            exit_code: None,
            log_path: None,
            source_ref: String::new(),
            dest_branch: String::new(),
            merge_branch: None,
            details: details.into(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Wall-clock duration, formatted `MM:SS.s`
    pub fn duration_display(&self) -> String {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => format_duration(end - start),
            _ => String::new(),
        }
    }
}

/// Aggregate of every task result in one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Timestamped directory holding this run's logs
    pub run_dir: PathBuf,
    /// One result per descriptor, in descriptor order
    pub results: Vec<MergeTaskResult>,
    /// URLs collected by post-task hooks
    pub pull_request_urls: Vec<String>,
}

impl RunSummary {
    /// True iff every task ended in a success status
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.status.is_success())
    }

    /// Process exit code for the run
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.is_success())
    }

    /// Results whose status is not a success
    pub fn failures(&self) -> impl Iterator<Item = &MergeTaskResult> {
        self.results.iter().filter(|r| !r.status.is_success())
    }
}

/// Format a duration as `MM:SS.s`; minutes are not capped at 60
pub fn format_duration(delta: TimeDelta) -> String {
    let millis = delta.num_milliseconds().max(0);
    let minutes = millis / 60_000;
    let tenths = (millis % 60_000) / 100;
    format!("{minutes:02}:{:02}.{}", tenths / 10, tenths % 10)
}
