//! fleet-merge - concurrent merges across many git repositories
//!
//! Given a list of repository descriptors
//! (`name:[source_ref]:[dest_branch]:[project/repo]`) and run-wide defaults,
//! fleet-merge runs the same fixed merge pipeline in every checkout, in
//! parallel, and reports one status per repository:
//!
//! 1. optional pre-task hook
//! 2. `reset --hard` + `clean -fd`
//! 3. checkout of the dest branch (optionally `pull --ff`)
//! 4. optional merge branch, reused if it already exists
//! 5. `merge --no-edit <options> <source_ref>`
//! 6. optional post-task hook
//!
//! A failure in one repository never stops the others; the run exits
//! nonzero if any repository did not end in a success status.

pub mod config;
pub mod error;
pub mod hook;
pub mod merge;
pub mod process;
pub mod report;
pub mod resolve;
pub mod run;
pub mod scheduler;
pub mod tasklog;
pub mod template;
pub mod types;
pub mod vcs;
