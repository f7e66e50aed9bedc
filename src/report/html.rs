//! HTML run report

use crate::types::{RunSummary, TaskStatus};
use html_escape::{encode_double_quoted_attribute, encode_text};

const fn status_class(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::SuccessNoDiff | TaskStatus::SuccessMerged => "ok",
        TaskStatus::ConflictOrDirty | TaskStatus::HookFailed => "warn",
        _ => "fail",
    }
}

/// Standalone HTML page for a run
pub fn render_html(summary: &RunSummary) -> String {
    let mut out = String::new();
    let title = format!("Merge report: {}", summary.run_dir.display());
    let title = encode_text(&title);
    out.push_str(&format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n"
    ));
    out.push_str(
        "<style>\n\
         table { border-collapse: collapse; font-family: monospace; }\n\
         th, td { border: 1px solid #999; padding: 4px 8px; vertical-align: top; }\n\
         td.details { white-space: pre-wrap; }\n\
         .ok { background: #dfd; }\n\
         .warn { background: #ffd; }\n\
         .fail { background: #fdd; }\n\
         </style>\n</head>\n<body>\n",
    );
    out.push_str(&format!("<h1>{title}</h1>\n"));
    let failed = summary.failures().count();
    out.push_str(&format!(
        "<p>{} repositories, {} succeeded, {} failed</p>\n",
        summary.results.len(),
        summary.results.len() - failed,
        failed
    ));

    out.push_str(
        "<table>\n<tr><th>Repository</th><th>Status</th><th>Source ref</th>\
         <th>Dest branch</th><th>Merge branch</th><th>Duration</th><th>Details</th></tr>\n",
    );
    for r in &summary.results {
        out.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"details\">{}</td></tr>\n",
            status_class(r.status),
            encode_text(&r.repo_local_name),
            encode_text(&r.status.to_string()),
            encode_text(&r.source_ref),
            encode_text(&r.dest_branch),
            encode_text(r.merge_branch.as_deref().unwrap_or("")),
            encode_text(&r.duration_display()),
            encode_text(&r.details),
        ));
    }
    out.push_str("</table>\n");

    if !summary.pull_request_urls.is_empty() {
        out.push_str("<h2>Pull requests</h2>\n<ul>\n");
        for url in &summary.pull_request_urls {
            out.push_str(&format!(
                "<li><a href=\"{}\">{}</a></li>\n",
                encode_double_quoted_attribute(url),
                encode_text(url)
            ));
        }
        out.push_str("</ul>\n");
    }
    out.push_str("</body>\n</html>\n");
    out
}
