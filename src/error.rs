//! Error types for fleet-merge

use thiserror::Error;

/// Errors raised by the orchestration library
///
/// Only run-wide preconditions are fatal. Everything that concerns a single
/// repository is converted into a [`TaskStatus`](crate::types::TaskStatus)
/// at the task boundary instead of bubbling up.
#[derive(Debug, Error)]
pub enum Error {
    /// A repository descriptor could not be split into its fields
    #[error("malformed repository descriptor '{descriptor}': {reason}")]
    Descriptor {
        /// The descriptor as given on the command line
        descriptor: String,
        /// What is wrong with it
        reason: String,
    },

    /// Invalid or incomplete run configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Merge-branch template could not be parsed or rendered
    #[error("template error: {0}")]
    Template(String),

    /// A rendered merge-branch name is not a usable branch name
    #[error("invalid branch name '{name}': {reason}")]
    InvalidBranchName {
        /// The rendered name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// A required merge driver is not on `PATH`
    #[error("merge driver '{0}' not found on PATH")]
    MergeDriverMissing(String),

    /// Filesystem or subprocess I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config file could not be parsed
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Unexpected internal failure
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;
