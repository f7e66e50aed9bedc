//! Command-line interface

mod context;
mod logging;
mod merge;
mod progress;
mod style;

pub use style::Stylize;

use clap::Parser;
use clap::builder::PossibleValuesParser;
use context::CommandContext;
use fleet_merge::config::{FileConfig, LOG_LEVELS};
use merge::{MergeOptions, run_merge};
use std::path::PathBuf;

/// Merge a source ref into a dest branch across many git repositories at once
#[derive(Debug, Parser)]
#[command(name = "fleet-merge", version, about, long_about = None)]
pub struct Cli {
    /// Repository descriptors: NAME[:SOURCE_REF[:DEST_BRANCH[:PROJECT/REPO]]]
    #[arg(short = 'r', long = "repos", value_name = "DESCRIPTOR", num_args = 1..)]
    pub repos: Vec<String>,

    /// Directory holding one checkout per repository
    #[arg(short = 'd', long, env = "FLEET_REPOS_DIR")]
    pub repos_dir: Option<PathBuf>,

    /// Directory receiving one timestamped log directory per run
    #[arg(short = 'o', long, env = "FLEET_LOGS_DIR")]
    pub logs_dir: Option<PathBuf>,

    /// Source ref for descriptors that leave it empty
    #[arg(short = 'S', long)]
    pub default_source_ref: Option<String>,

    /// Dest branch for descriptors that leave it empty
    #[arg(short = 'D', long)]
    pub default_dest_branch: Option<String>,

    /// Extra arguments passed to `git merge`, e.g. "--no-ff -X theirs"
    #[arg(short = 'm', long, allow_hyphen_values = true)]
    pub merge_options: Option<String>,

    /// Template for an intermediate merge branch, e.g.
    /// "merge/{{source_ref.replace('origin/','')}}_into_{{dest_branch}}"
    #[arg(short = 't', long)]
    pub merge_branch_template: Option<String>,

    /// Shell command run before each task
    #[arg(long, env = "FLEET_PRE_HOOK")]
    pub pre_hook: Option<String>,

    /// Shell command run after each merge, whatever its outcome
    #[arg(long, env = "FLEET_POST_HOOK")]
    pub post_hook: Option<String>,

    /// Maximum concurrent tasks [default: one per repository]
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Prefix for the environment variables exported to hooks [default: FLEET_]
    #[arg(long)]
    pub env_prefix: Option<String>,

    /// Fast-forward the dest branch from upstream before merging
    #[arg(long)]
    pub pull: bool,

    /// Program that must be on PATH before the run starts (repeatable)
    #[arg(long = "merge-driver", value_name = "PROGRAM")]
    pub merge_drivers: Vec<String>,

    /// Regex matching pull-request URLs in post-hook output
    #[arg(long)]
    pub pr_url_pattern: Option<String>,

    /// Show what would run without touching any repository
    #[arg(long)]
    pub dry_run: bool,

    /// Show the plan and ask before running
    #[arg(long)]
    pub confirm: bool,

    /// Log verbosity [default: info]
    #[arg(short = 'l', long, value_parser = PossibleValuesParser::new(LOG_LEVELS))]
    pub log_level: Option<String>,

    /// TOML file with defaults for any of the options above
    #[arg(short = 'c', long, env = "FLEET_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Command-line values as the top configuration layer
    pub fn to_file_config(&self) -> FileConfig {
        FileConfig {
            repos: (!self.repos.is_empty()).then(|| self.repos.clone()),
            repos_dir: self.repos_dir.clone(),
            logs_dir: self.logs_dir.clone(),
            default_source_ref: self.default_source_ref.clone(),
            default_dest_branch: self.default_dest_branch.clone(),
            merge_branch_template: self.merge_branch_template.clone(),
            merge_options: self.merge_options.clone(),
            pre_hook: self.pre_hook.clone(),
            post_hook: self.post_hook.clone(),
            jobs: self.jobs,
            env_prefix: self.env_prefix.clone(),
            pull: self.pull.then_some(true),
            merge_drivers: (!self.merge_drivers.is_empty()).then(|| self.merge_drivers.clone()),
            pr_url_pattern: self.pr_url_pattern.clone(),
            dry_run: self.dry_run.then_some(true),
            log_level: self.log_level.clone(),
        }
    }
}

/// Run the CLI, returning the process exit code
pub async fn run(cli: Cli) -> anyhow::Result<u8> {
    let ctx = CommandContext::new(&cli)?;
    logging::init(&ctx.config.log_level, &ctx.run_dir)?;
    let code = run_merge(
        ctx,
        MergeOptions {
            confirm: cli.confirm,
        },
    )
    .await?;
    Ok(code)
}
