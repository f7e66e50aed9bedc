//! Temporary git checkouts for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Run git in `dir`, panicking on failure, returning trimmed stdout
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {args:?} failed in {}: {}",
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A repositories root and a logs root, both removed on drop
///
/// Every repository starts with one commit on `main`.
pub struct TempFleet {
    repos: TempDir,
    logs: TempDir,
}

impl TempFleet {
    /// Empty fleet
    pub fn new() -> Self {
        Self {
            repos: TempDir::new().expect("failed to create repos dir"),
            logs: TempDir::new().expect("failed to create logs dir"),
        }
    }

    /// Root holding the checkouts
    pub fn repos_dir(&self) -> &Path {
        self.repos.path()
    }

    /// Root for run log directories
    pub fn logs_dir(&self) -> &Path {
        self.logs.path()
    }

    /// Checkout path of `name`
    pub fn repo(&self, name: &str) -> PathBuf {
        self.repos.path().join(name)
    }

    /// Create a repository with `README` committed on `main`
    pub fn init_repo(&self, name: &str) -> PathBuf {
        let dir = self.repo(name);
        std::fs::create_dir_all(&dir).expect("failed to create repo dir");
        git(&dir, &["init", "-q"]);
        git(&dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(&dir, &["config", "user.email", "test@example.com"]);
        git(&dir, &["config", "user.name", "Test User"]);
        git(&dir, &["config", "commit.gpgsign", "false"]);
        self.commit_file(name, "main", "README", "initial\n", "initial commit");
        dir
    }

    /// Commit `content` to `file` on `branch`, creating the branch from the
    /// current head if needed, then switch back to `main`
    pub fn commit_file(&self, name: &str, branch: &str, file: &str, content: &str, message: &str) {
        let dir = self.repo(name);
        if self.branch_exists(name, branch) {
            git(&dir, &["checkout", "-q", branch]);
        } else if branch != "main" || self.has_commits(name) {
            git(&dir, &["checkout", "-q", "-b", branch]);
        }
        std::fs::write(dir.join(file), content).expect("failed to write file");
        git(&dir, &["add", file]);
        git(&dir, &["commit", "-q", "-m", message]);
        if branch != "main" {
            git(&dir, &["checkout", "-q", "main"]);
        }
    }

    /// Whether a local branch exists
    pub fn branch_exists(&self, name: &str, branch: &str) -> bool {
        Command::new("git")
            .arg("-C")
            .arg(self.repo(name))
            .args(["show-ref", "--verify", "--quiet", &format!("refs/heads/{branch}")])
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn has_commits(&self, name: &str) -> bool {
        Command::new("git")
            .arg("-C")
            .arg(self.repo(name))
            .args(["rev-parse", "--verify", "--quiet", "HEAD"])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Commit id of a ref
    pub fn rev(&self, name: &str, rev: &str) -> String {
        git(&self.repo(name), &["rev-parse", rev])
    }

    /// Currently checked-out branch
    pub fn current_branch(&self, name: &str) -> String {
        git(&self.repo(name), &["rev-parse", "--abbrev-ref", "HEAD"])
    }

    /// Porcelain status output
    pub fn status(&self, name: &str) -> String {
        git(&self.repo(name), &["status", "--porcelain"])
    }
}
