//! Tracing subscriber setup
//!
//! Two sinks: stderr for the operator and `out.log` in the run directory.
//! `RUST_LOG` overrides the configured level.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Run-wide log file name
pub const RUN_LOG_FILE_NAME: &str = "out.log";

/// Install the global subscriber
pub fn init(level: &str, run_dir: &Path) -> Result<()> {
    let path = run_dir.join(RUN_LOG_FILE_NAME);
    let file = File::create(&path).with_context(|| format!("cannot create {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
        .try_init()
        .context("cannot install tracing subscriber")?;
    Ok(())
}
