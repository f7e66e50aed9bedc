//! Per-task transcript files
//!
//! Every task writes `repo--<name>.log` in the run directory. Write failures
//! are logged and otherwise ignored: losing a transcript must not change a
//! task's status.

use crate::error::Result;
use crate::process::CommandOutput;
use crate::types::format_duration;
use chrono::TimeDelta;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Transcript file name for a repository
///
/// Resolved names are a single directory component, so the mapping is
/// one-to-one and two tasks never share a transcript.
pub fn log_file_name(repo_local_name: &str) -> String {
    format!("repo--{repo_local_name}.log")
}

/// Append-only transcript for one task
#[derive(Debug)]
pub struct TaskLog {
    path: PathBuf,
    file: File,
}

impl TaskLog {
    /// Create (or truncate) the transcript for `repo_local_name` in `run_dir`
    pub fn create(run_dir: &Path, repo_local_name: &str) -> Result<Self> {
        let path = run_dir.join(log_file_name(repo_local_name));
        let file = File::create(&path)?;
        Ok(Self { path, file })
    }

    /// Location of the transcript
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one line
    pub fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.file, "{text}") {
            warn!(path = %self.path.display(), error = %e, "cannot write task log");
        }
    }

    /// Record a finished command with its exit code, timing and output
    pub fn command(&mut self, output: &CommandOutput) {
        let duration = TimeDelta::from_std(output.duration).unwrap_or_else(|_| TimeDelta::zero());
        let code = output
            .exit_code
            .map_or_else(|| "killed".to_string(), |c| c.to_string());
        self.line(&format!("$ {}", output.command));
        self.line(&format!(
            "Returncode: {code}; Duration: {}; Output:",
            format_duration(duration)
        ));
        let combined = output.combined();
        if !combined.is_empty() {
            self.line(combined.trim_end());
        }
    }

    /// Record a labelled value as pretty JSON
    pub fn json(&mut self, label: &str, value: &impl Serialize) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => self.line(&format!("{label}:\n{json}")),
            Err(e) => self.line(&format!("{label}: <unserializable: {e}>")),
        }
    }
}
