//! Shared test utilities

mod mock_vcs;
mod temp_git;

#[allow(unused_imports)]
pub use mock_vcs::{HookCall, MergeScript, MockHooks, MockVcs, RepoScript, VcsCall};
#[allow(unused_imports)]
pub use temp_git::{TempFleet, git};

use fleet_merge::config::{FileConfig, RunConfig};
use std::path::Path;

/// Config over `repos_dir`/`logs_dir` with `main` as the dest default
#[allow(dead_code)]
pub fn run_config(repos: &[&str], repos_dir: &Path, logs_dir: &Path) -> FileConfig {
    FileConfig {
        repos: Some(repos.iter().map(|r| (*r).to_string()).collect()),
        repos_dir: Some(repos_dir.to_path_buf()),
        logs_dir: Some(logs_dir.to_path_buf()),
        default_dest_branch: Some("main".to_string()),
        ..FileConfig::default()
    }
}

/// Validate a [`FileConfig`], panicking on error
#[allow(dead_code)]
pub fn validated(file: FileConfig) -> RunConfig {
    RunConfig::try_from(file).expect("invalid test config")
}
