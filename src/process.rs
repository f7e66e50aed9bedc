//! Subprocess execution shared by the VCS and hook boundaries

use crate::error::Result;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Captured result of one finished subprocess
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Command line as shown in logs
    pub command: String,
    /// Exit code, `None` if killed by a signal
    pub exit_code: Option<i32>,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Wall-clock time the process ran
    pub duration: Duration,
}

impl CommandOutput {
    /// Whether the process exited with status 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Run a prepared command to completion and capture its output
///
/// The child is killed if the returned future is dropped, so aborting a task
/// also stops its subprocess.
pub async fn run_captured(mut cmd: Command, shown: String) -> Result<CommandOutput> {
    cmd.kill_on_drop(true);
    cmd.stdin(std::process::Stdio::null());
    debug!(command = %shown, "spawning");

    let started = Instant::now();
    let output = cmd.output().await?;
    let duration = started.elapsed();

    let result = CommandOutput {
        command: shown,
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        duration,
    };
    debug!(command = %result.command, exit_code = ?result.exit_code, "finished");
    Ok(result)
}
