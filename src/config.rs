//! Run configuration
//!
//! Values come from built-in defaults, an optional TOML file, and the
//! command line, in increasing precedence. The merged [`FileConfig`] is
//! validated once into a [`RunConfig`], which is then passed by reference
//! through the rest of the run.

use crate::error::{Error, Result};
use crate::hook::DEFAULT_ENV_PREFIX;
use crate::resolve::BranchDefaults;
use crate::template::Template;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Accepted `log-level` values
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Unvalidated configuration as read from a file or the command line
///
/// Every field is optional so layers can be overlaid.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    /// Repository descriptors
    pub repos: Option<Vec<String>>,
    /// Root holding all checkouts
    pub repos_dir: Option<PathBuf>,
    /// Root for timestamped run directories
    pub logs_dir: Option<PathBuf>,
    /// Source ref for descriptors that leave it empty
    pub default_source_ref: Option<String>,
    /// Dest branch for descriptors that leave it empty
    pub default_dest_branch: Option<String>,
    /// Merge-branch name template
    pub merge_branch_template: Option<String>,
    /// Extra merge arguments, whitespace separated
    pub merge_options: Option<String>,
    /// Pre-task hook command
    pub pre_hook: Option<String>,
    /// Post-task hook command
    pub post_hook: Option<String>,
    /// Worker pool size
    pub jobs: Option<usize>,
    /// Prefix for hook environment variables
    pub env_prefix: Option<String>,
    /// Pull after checkout
    pub pull: Option<bool>,
    /// Programs that must be on `PATH`
    pub merge_drivers: Option<Vec<String>>,
    /// Regex matching pull-request URLs in post-hook output
    pub pr_url_pattern: Option<String>,
    /// Plan only
    pub dry_run: Option<bool>,
    /// Log verbosity
    pub log_level: Option<String>,
}

impl FileConfig {
    /// Read a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let config = toml::from_str(&text)?;
        debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }

    /// Layer `other` on top of `self`; values set in `other` win
    #[must_use]
    pub fn overlay(self, other: Self) -> Self {
        Self {
            repos: other.repos.or(self.repos),
            repos_dir: other.repos_dir.or(self.repos_dir),
            logs_dir: other.logs_dir.or(self.logs_dir),
            default_source_ref: other.default_source_ref.or(self.default_source_ref),
            default_dest_branch: other.default_dest_branch.or(self.default_dest_branch),
            merge_branch_template: other.merge_branch_template.or(self.merge_branch_template),
            merge_options: other.merge_options.or(self.merge_options),
            pre_hook: other.pre_hook.or(self.pre_hook),
            post_hook: other.post_hook.or(self.post_hook),
            jobs: other.jobs.or(self.jobs),
            env_prefix: other.env_prefix.or(self.env_prefix),
            pull: other.pull.or(self.pull),
            merge_drivers: other.merge_drivers.or(self.merge_drivers),
            pr_url_pattern: other.pr_url_pattern.or(self.pr_url_pattern),
            dry_run: other.dry_run.or(self.dry_run),
            log_level: other.log_level.or(self.log_level),
        }
    }
}

/// Validated configuration for one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Repository descriptors, in order
    pub repos: Vec<String>,
    /// Root holding all checkouts
    pub repos_dir: PathBuf,
    /// Root for timestamped run directories
    pub logs_dir: PathBuf,
    /// Run-wide branch defaults
    pub branch_defaults: BranchDefaults,
    /// Parsed merge-branch template
    pub merge_branch_template: Option<Template>,
    /// Extra merge arguments
    pub merge_options: Vec<String>,
    /// Pre-task hook command
    pub pre_hook: Option<String>,
    /// Post-task hook command
    pub post_hook: Option<String>,
    /// Explicit worker pool size
    pub jobs: Option<usize>,
    /// Prefix for hook environment variables
    pub env_prefix: String,
    /// Pull after checkout
    pub pull: bool,
    /// Programs that must be on `PATH`
    pub merge_drivers: Vec<String>,
    /// Regex matching pull-request URLs in post-hook output
    pub pr_url_pattern: Option<Regex>,
    /// Plan only
    pub dry_run: bool,
    /// Log verbosity
    pub log_level: String,
}

impl RunConfig {
    /// Pool size: explicit `jobs`, else one worker per runnable task
    pub fn jobs_for(&self, runnable: usize) -> usize {
        self.jobs.unwrap_or(runnable).max(1)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<FileConfig> for RunConfig {
    type Error = Error;

    fn try_from(file: FileConfig) -> Result<Self> {
        let repos = file.repos.unwrap_or_default();
        if repos.is_empty() {
            return Err(Error::Config("no repositories given".to_string()));
        }
        let repos_dir = file
            .repos_dir
            .ok_or_else(|| Error::Config("repositories directory is required".to_string()))?;
        let logs_dir = file
            .logs_dir
            .ok_or_else(|| Error::Config("logs directory is required".to_string()))?;

        let log_level = file
            .log_level
            .unwrap_or_else(|| "info".to_string())
            .to_lowercase();
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            return Err(Error::Config(format!(
                "unknown log level '{log_level}', expected one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        if file.jobs == Some(0) {
            return Err(Error::Config("jobs must be at least 1".to_string()));
        }

        let merge_branch_template = non_empty(file.merge_branch_template)
            .map(|t| Template::parse(&t))
            .transpose()?;
        let pr_url_pattern = non_empty(file.pr_url_pattern)
            .map(|p| {
                Regex::new(&p).map_err(|e| Error::Config(format!("invalid PR URL pattern: {e}")))
            })
            .transpose()?;
        let merge_options = non_empty(file.merge_options)
            .map(|o| {
                shlex::split(&o)
                    .ok_or_else(|| Error::Config(format!("unbalanced quotes in merge options: {o}")))
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            repos,
            repos_dir,
            logs_dir,
            branch_defaults: BranchDefaults {
                source_ref: non_empty(file.default_source_ref),
                dest_branch: non_empty(file.default_dest_branch),
            },
            merge_branch_template,
            merge_options,
            pre_hook: non_empty(file.pre_hook),
            post_hook: non_empty(file.post_hook),
            jobs: file.jobs,
            env_prefix: file
                .env_prefix
                .unwrap_or_else(|| DEFAULT_ENV_PREFIX.to_string()),
            pull: file.pull.unwrap_or(false),
            merge_drivers: file.merge_drivers.unwrap_or_default(),
            pr_url_pattern,
            dry_run: file.dry_run.unwrap_or(false),
            log_level,
        })
    }
}

/// Ensure every merge driver resolves on `PATH`
///
/// Returns the resolved paths. The first missing driver fails the run.
pub fn check_merge_drivers(drivers: &[String]) -> Result<Vec<PathBuf>> {
    drivers
        .iter()
        .map(|name| {
            let path =
                which::which(name).map_err(|_| Error::MergeDriverMissing(name.clone()))?;
            debug!(driver = %name, path = %path.display(), "merge driver found");
            Ok(path)
        })
        .collect()
}
