//! Progress bar over the task pool

use crate::cli::style::{Stylize, status};
use fleet_merge::scheduler::RunProgress;
use fleet_merge::types::MergeTaskResult;
use indicatif::ProgressBar;
use std::collections::BTreeSet;
use std::sync::Mutex;
use std::time::Duration;

/// [`RunProgress`] that drives an indicatif bar and prints one line per
/// finished task above it
pub struct CliProgress {
    bar: ProgressBar,
    running: Mutex<BTreeSet<String>>,
}

impl CliProgress {
    /// Bar sized for `total` tasks
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(crate::cli::style::progress_style());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self {
            bar,
            running: Mutex::new(BTreeSet::new()),
        }
    }

    /// Remove the bar from the terminal
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn update_running(&self, f: impl FnOnce(&mut BTreeSet<String>)) {
        if let Ok(mut running) = self.running.lock() {
            f(&mut running);
            let names: Vec<&str> = running.iter().map(String::as_str).collect();
            self.bar.set_message(names.join(", "));
        }
    }
}

impl RunProgress for CliProgress {
    fn on_task_started(&self, repo_local_name: &str) {
        self.update_running(|r| {
            r.insert(repo_local_name.to_string());
        });
    }

    fn on_task_finished(&self, result: &MergeTaskResult) {
        self.update_running(|r| {
            r.remove(&result.repo_local_name);
        });
        let name = if result.repo_local_name.is_empty() {
            "(unnamed)".to_string()
        } else {
            result.repo_local_name.clone()
        };
        self.bar.println(format!(
            "{} {} {}",
            status(result.status),
            name.accent(),
            result.duration_display().muted()
        ));
        self.bar.inc(1);
    }
}
