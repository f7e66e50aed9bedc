//! Shared setup for the run command
//!
//! Merges the config file with the command line, validates the result and
//! creates the run's timestamped log directory.

use crate::cli::Cli;
use chrono::Local;
use fleet_merge::config::{FileConfig, RunConfig};
use fleet_merge::error::Result;
use fleet_merge::run::create_run_dir;
use std::path::PathBuf;

/// Validated configuration plus the directory this run logs into
pub struct CommandContext {
    /// Run configuration
    pub config: RunConfig,
    /// `<logs_dir>/<YYYYmmdd-HHMMSS>`
    pub run_dir: PathBuf,
}

impl CommandContext {
    /// Build the context from parsed arguments
    pub fn new(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        let config = RunConfig::try_from(file.overlay(cli.to_file_config()))?;
        let run_dir = create_run_dir(&config.logs_dir, Local::now())?;
        Ok(Self { config, run_dir })
    }
}
