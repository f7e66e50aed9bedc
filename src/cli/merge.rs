//! Merge command - run the merge pipeline over every repository

use crate::cli::context::CommandContext;
use crate::cli::progress::CliProgress;
use crate::cli::style::{Stylize, check, status};
use anstream::{print, println};
use chrono::Local;
use dialoguer::Confirm;
use fleet_merge::error::{Error, Result};
use fleet_merge::hook::ShellHookRunner;
use fleet_merge::report::results_table;
use fleet_merge::run::{PlannedTask, execute_run, plan_run};
use fleet_merge::types::RunSummary;
use fleet_merge::vcs::GitCli;
use std::sync::Arc;
use tracing::warn;

/// Options for the merge command
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Preview the plan and prompt for confirmation before executing
    pub confirm: bool,
}

/// Run the merge command, returning the process exit code
pub async fn run_merge(ctx: CommandContext, options: MergeOptions) -> Result<u8> {
    let CommandContext { config, run_dir } = ctx;

    if config.dry_run || options.confirm {
        let plan = plan_run(&config, &run_dir, Local::now());
        report_dry_run(&plan);
        let invalid = plan
            .iter()
            .any(|p| matches!(p, PlannedTask::Invalid { .. }));

        if config.dry_run {
            println!("{}", "Run without --dry-run to execute.".muted());
            return Ok(u8::from(invalid));
        }
        if !Confirm::new()
            .with_prompt("Proceed with merge?")
            .default(true)
            .interact()
            .map_err(|e| Error::Internal(format!("Failed to read confirmation: {e}")))?
        {
            println!("{}", "Aborted".muted());
            return Ok(0);
        }
        println!();
    }

    println!(
        "{} {} {}",
        "Merging".emphasis(),
        format!("{} repositories", config.repos.len()).accent(),
        format!("(logs: {})", run_dir.display()).muted()
    );

    let progress = Arc::new(CliProgress::new(config.repos.len()));
    let summary = execute_run(
        &config,
        &run_dir,
        Arc::new(GitCli::default()),
        Arc::new(ShellHookRunner),
        progress.clone(),
        interrupted(),
    )
    .await?;
    progress.finish();

    print_summary(&summary);
    Ok(u8::from(!summary.is_success()))
}

/// Completes on Ctrl-C; never completes if the signal cannot be watched
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    print!("{}", results_table(&summary.results));
    println!();

    let failed = summary.failures().count();
    if failed == 0 {
        println!(
            "{} All {} repositories merged",
            check(),
            summary.results.len()
        );
    } else {
        println!(
            "{} {} of {} repositories did not succeed",
            "✗".error(),
            failed.to_string().error(),
            summary.results.len()
        );
        for result in summary.failures() {
            let log = result
                .log_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            println!(
                "   {} {} {}",
                result.repo_local_name.accent(),
                status(result.status),
                log.muted()
            );
        }
    }

    if !summary.pull_request_urls.is_empty() {
        println!();
        println!("{}:", "Pull requests".emphasis());
        for url in &summary.pull_request_urls {
            println!("   {}", url.accent());
        }
    }

    println!();
    println!(
        "{} {}",
        "Logs:".muted(),
        summary.run_dir.display().to_string().accent()
    );
}

/// Report what would run (dry run)
fn report_dry_run(plan: &[PlannedTask]) {
    println!("{}:", "Merge plan".emphasis());
    println!();

    for task in plan {
        match task {
            PlannedTask::Ready { spec, steps } => {
                println!(
                    "  {} {}: {} -> {}",
                    "✓ Would merge".success(),
                    spec.repo_local_name.accent(),
                    spec.source_ref,
                    spec.target_branch()
                );
                for step in steps {
                    println!("    - {}", step.to_string().muted());
                }
            }
            PlannedTask::Invalid {
                raw_descriptor,
                details,
            } => {
                println!("  {} {}", "✗ Would skip".warn(), raw_descriptor.accent());
                println!("    - {}", details.muted());
            }
        }
    }
    println!();
}
