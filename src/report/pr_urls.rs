//! Shared pull-request URL file

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Name of the URL file inside the run directory
pub const PR_URLS_FILE_NAME: &str = "pr-urls.txt";

/// Append-only collection of pull-request URLs
///
/// Hooks may append to the file themselves (its path is exported to them);
/// appends made through this type are serialized by an in-process lock so
/// concurrent tasks never interleave partial lines.
#[derive(Debug)]
pub struct PrUrlCollector {
    path: PathBuf,
    pattern: Option<Regex>,
    lock: Mutex<()>,
}

impl PrUrlCollector {
    /// Collector writing to `path`, scanning hook output with `pattern` if set
    pub fn new(path: impl Into<PathBuf>, pattern: Option<Regex>) -> Self {
        Self {
            path: path.into(),
            pattern,
            lock: Mutex::new(()),
        }
    }

    /// Location of the URL file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one URL as its own line
    pub fn append(&self, url: &str) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::Internal("PR URL lock poisoned".to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", url.trim())?;
        Ok(())
    }

    /// Append every match of the configured pattern found in `output`
    ///
    /// Returns the URLs that were appended.
    pub fn scan(&self, output: &str) -> Result<Vec<String>> {
        let Some(pattern) = &self.pattern else {
            return Ok(Vec::new());
        };
        let found: Vec<String> = pattern
            .find_iter(output)
            .map(|m| m.as_str().to_string())
            .collect();
        for url in &found {
            debug!(url = %url, "collected pull request URL");
            self.append(url)?;
        }
        Ok(found)
    }

    /// Every URL in the file, first occurrence order, without duplicates
    pub fn read_all(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        let mut seen = HashSet::new();
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| seen.insert(*line))
            .map(str::to_string)
            .collect())
    }
}
