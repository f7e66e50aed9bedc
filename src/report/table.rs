//! Plain-text results table

use crate::types::MergeTaskResult;

const DETAILS_WIDTH: usize = 50;

/// Results as a grid table, one row per task
pub fn results_table(results: &[MergeTaskResult]) -> String {
    let headers = ["Repository", "Source -> Dest", "Duration", "Status", "Details"];
    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|r| {
            let refs = if r.source_ref.is_empty() && r.dest_branch.is_empty() {
                String::new()
            } else {
                let mut refs = format!("{}\n-> {}", r.source_ref, r.dest_branch);
                if let Some(branch) = &r.merge_branch {
                    refs.push_str(&format!("\nvia {branch}"));
                }
                refs
            };
            vec![
                r.repo_local_name.clone(),
                refs,
                r.duration_display(),
                r.status.to_string(),
                wrap(&r.details, DETAILS_WIDTH),
            ]
        })
        .collect();
    grid(&headers, &rows)
}

/// Render a grid table; cells may span several lines
pub fn grid(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            let longest = cell.lines().map(|l| l.chars().count()).max().unwrap_or(0);
            *width = (*width).max(longest);
        }
    }

    let rule = |fill: char| {
        let mut line = String::from("+");
        for width in &widths {
            line.extend(std::iter::repeat_n(fill, width + 2));
            line.push('+');
        }
        line.push('\n');
        line
    };

    let header_cells: Vec<String> = headers.iter().map(|h| (*h).to_string()).collect();
    let mut out = rule('-');
    out.push_str(&render_row(&header_cells, &widths));
    out.push_str(&rule('='));
    for row in rows {
        out.push_str(&render_row(row, &widths));
        out.push_str(&rule('-'));
    }
    out
}

fn render_row(cells: &[String], widths: &[usize]) -> String {
    let split: Vec<Vec<&str>> = cells.iter().map(|c| c.lines().collect()).collect();
    let height = split.iter().map(Vec::len).max().unwrap_or(0).max(1);

    let mut out = String::new();
    for i in 0..height {
        out.push('|');
        for (lines, width) in split.iter().zip(widths) {
            let text = lines.get(i).copied().unwrap_or("");
            let pad = width - text.chars().count();
            out.push(' ');
            out.push_str(text);
            out.extend(std::iter::repeat_n(' ', pad + 1));
            out.push('|');
        }
        out.push('\n');
    }
    out
}

/// Greedy word wrap; words longer than `width` get a line of their own
fn wrap(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let needed = current.chars().count() + word.chars().count() + 1;
            if !current.is_empty() && needed > width {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskStatus;

    #[test]
    fn test_grid_layout() {
        let table = grid(
            &["a", "bb"],
            &[vec!["xyz".to_string(), "1\n22".to_string()]],
        );
        assert_eq!(
            table,
            "+-----+----+\n\
             | a   | bb |\n\
             +=====+====+\n\
             | xyz | 1  |\n\
             |     | 22 |\n\
             +-----+----+\n"
        );
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("one two three", 7), "one two\nthree");
        assert_eq!(wrap("", 10), "");
        assert_eq!(wrap("averyveryverylongword x", 5), "averyveryverylongword\nx");
    }

    #[test]
    fn test_results_table_rows() {
        let mut ok = MergeTaskResult::unstarted("repo-a", TaskStatus::SuccessMerged, "");
        ok.source_ref = "origin/main".to_string();
        ok.dest_branch = "prod".to_string();
        let bad = MergeTaskResult::unstarted("", TaskStatus::ConfigError, "malformed descriptor");

        let table = results_table(&[ok, bad]);
        assert!(table.contains("| repo-a "));
        assert!(table.contains("| origin/main "));
        assert!(table.contains("| -> prod "));
        assert!(table.contains("success (merged)"));
        assert!(table.contains("malformed descriptor"));
    }
}
