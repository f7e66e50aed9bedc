//! Result and log aggregation
//!
//! Folds task results into a [`RunSummary`] and writes the run's report
//! files next to the per-task logs.

mod html;
mod pr_urls;
mod table;

pub use html::render_html;
pub use pr_urls::{PR_URLS_FILE_NAME, PrUrlCollector};
pub use table::{grid, results_table};

use crate::error::Result;
use crate::types::{MergeTaskResult, RunSummary};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// HTML report file name
pub const HTML_REPORT_FILE_NAME: &str = "report.html";
/// JSON summary file name
pub const SUMMARY_FILE_NAME: &str = "summary.json";

/// Build the run summary
///
/// URLs are read back from the shared file; a read failure is logged and
/// leaves the list empty.
pub fn summarize(
    run_dir: &Path,
    results: Vec<MergeTaskResult>,
    pr_urls: &PrUrlCollector,
) -> RunSummary {
    let pull_request_urls = pr_urls.read_all().unwrap_or_else(|e| {
        warn!(error = %e, "cannot read pull request URL file");
        Vec::new()
    });
    RunSummary {
        run_dir: run_dir.to_path_buf(),
        results,
        pull_request_urls,
    }
}

/// Write `report.html` and `summary.json` into the run directory
///
/// Returns the paths written.
pub fn write_reports(summary: &RunSummary) -> Result<Vec<PathBuf>> {
    let html_path = summary.run_dir.join(HTML_REPORT_FILE_NAME);
    std::fs::write(&html_path, render_html(summary))?;

    let json_path = summary.run_dir.join(SUMMARY_FILE_NAME);
    std::fs::write(&json_path, serde_json::to_string_pretty(summary)?)?;

    debug!(html = %html_path.display(), json = %json_path.display(), "reports written");
    Ok(vec![html_path, json_path])
}
