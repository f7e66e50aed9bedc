//! Terminal styling
//!
//! Colors are always emitted; `anstream::println!` strips them when the
//! output is not a color-capable terminal.

use fleet_merge::types::TaskStatus;
use indicatif::ProgressStyle;
use owo_colors::OwoColorize;
use std::fmt::Display;

/// Semantic colors for CLI output
pub trait Stylize {
    /// Green, for successes
    fn success(&self) -> String;
    /// Yellow, for warnings and soft failures
    fn warn(&self) -> String;
    /// Red, for failures
    fn error(&self) -> String;
    /// Dimmed, for secondary information
    fn muted(&self) -> String;
    /// Cyan, for names and values
    fn accent(&self) -> String;
    /// Bold
    fn emphasis(&self) -> String;
}

impl<T: Display> Stylize for T {
    fn success(&self) -> String {
        self.green().to_string()
    }

    fn warn(&self) -> String {
        self.yellow().to_string()
    }

    fn error(&self) -> String {
        self.red().to_string()
    }

    fn muted(&self) -> String {
        self.dimmed().to_string()
    }

    fn accent(&self) -> String {
        self.cyan().to_string()
    }

    fn emphasis(&self) -> String {
        self.bold().to_string()
    }
}

/// Checkmark in the success color
pub fn check() -> String {
    "✓".success()
}

/// Status text colored by outcome
pub fn status(status: TaskStatus) -> String {
    match status {
        TaskStatus::SuccessNoDiff | TaskStatus::SuccessMerged => status.success(),
        TaskStatus::ConflictOrDirty | TaskStatus::HookFailed | TaskStatus::Cancelled => {
            status.warn()
        }
        _ => status.error(),
    }
}

/// Progress bar style for the task pool
pub fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
}
