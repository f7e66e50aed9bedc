//! Mock version-control and hook boundaries for testing

// Compiled into every test binary through `common`; only `unit_tests` drives them.
#![allow(dead_code)]

use async_trait::async_trait;
use fleet_merge::error::{Error, Result};
use fleet_merge::hook::HookRunner;
use fleet_merge::process::CommandOutput;
use fleet_merge::vcs::Vcs;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How a scripted merge behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeScript {
    /// Exit 0, head unchanged, tree clean
    UpToDate,
    /// Exit 0, new head, tree clean
    Merged,
    /// Exit 1, unmerged paths left behind
    Conflict,
    /// Exit 128, nothing touched
    Fails,
    /// The merge command cannot be spawned
    SpawnError,
    /// The task panics inside the merge
    Panic,
}

/// Scripted behavior for one repository
#[derive(Debug, Clone)]
pub struct RepoScript {
    /// `.git` is present
    pub exists: bool,
    /// `reset --hard` exits 0
    pub reset_ok: bool,
    /// `checkout <dest>` exits 0
    pub checkout_ok: bool,
    /// `pull` exits 0
    pub pull_ok: bool,
    /// The merge branch already exists
    pub branch_exists: bool,
    /// Merge outcome
    pub merge: MergeScript,
    /// How long the merge takes
    pub merge_delay: Duration,
}

impl Default for RepoScript {
    fn default() -> Self {
        Self {
            exists: true,
            reset_ok: true,
            checkout_ok: true,
            pull_ok: true,
            branch_exists: false,
            merge: MergeScript::Merged,
            merge_delay: Duration::ZERO,
        }
    }
}

impl RepoScript {
    /// Script with the given merge outcome
    pub fn merging(merge: MergeScript) -> Self {
        Self {
            merge,
            ..Self::default()
        }
    }
}

/// One recorded VCS call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsCall {
    /// Repository directory name
    pub repo: String,
    /// Operation and arguments, space separated
    pub op: String,
}

#[derive(Debug, Default)]
struct RepoState {
    head: u32,
    dirty: bool,
}

/// Mock [`Vcs`] keyed by the checkout directory's file name
///
/// Features:
/// - Per-repository scripted outcomes
/// - Call tracking for verification
/// - Concurrency high-water mark for pool-size tests
pub struct MockVcs {
    scripts: Mutex<HashMap<String, RepoScript>>,
    state: Mutex<HashMap<String, RepoState>>,
    calls: Mutex<Vec<VcsCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MockVcs {
    fn default() -> Self {
        Self::new()
    }
}

impl MockVcs {
    /// Every repository behaves like [`RepoScript::default`] unless scripted
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            state: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Script one repository
    pub fn script(&self, repo: &str, script: RepoScript) {
        self.scripts
            .lock()
            .unwrap()
            .insert(repo.to_string(), script);
    }

    /// All calls so far
    pub fn calls(&self) -> Vec<VcsCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Operations for one repository, in order
    pub fn ops_for(&self, repo: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.repo == repo)
            .map(|c| c.op)
            .collect()
    }

    /// Highest number of merges observed running at once
    pub fn max_concurrent_merges(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn repo_name(dir: &Path) -> String {
        dir.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn script_for(&self, repo: &str) -> RepoScript {
        self.scripts
            .lock()
            .unwrap()
            .get(repo)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, dir: &Path, op: impl Into<String>) -> (String, RepoScript) {
        let repo = Self::repo_name(dir);
        self.calls.lock().unwrap().push(VcsCall {
            repo: repo.clone(),
            op: op.into(),
        });
        let script = self.script_for(&repo);
        (repo, script)
    }

    fn output(command: &str, exit_code: i32, stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            command: command.to_string(),
            exit_code: Some(exit_code),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            duration: Duration::from_millis(1),
        }
    }

    fn ok_or(command: &str, ok: bool) -> CommandOutput {
        if ok {
            Self::output(command, 0, "", "")
        } else {
            Self::output(command, 1, "", &format!("error: {command} failed"))
        }
    }
}

#[async_trait]
impl Vcs for MockVcs {
    fn is_repository(&self, dir: &Path) -> bool {
        self.script_for(&Self::repo_name(dir)).exists
    }

    async fn reset_hard(&self, dir: &Path) -> Result<CommandOutput> {
        let (_, script) = self.record(dir, "reset --hard");
        Ok(Self::ok_or("git reset --hard", script.reset_ok))
    }

    async fn clean(&self, dir: &Path) -> Result<CommandOutput> {
        let (_, script) = self.record(dir, "clean -fd");
        Ok(Self::ok_or("git clean -fd", script.reset_ok))
    }

    async fn checkout(&self, dir: &Path, branch: &str) -> Result<CommandOutput> {
        let (_, script) = self.record(dir, format!("checkout {branch}"));
        Ok(Self::ok_or("git checkout", script.checkout_ok))
    }

    async fn pull(&self, dir: &Path) -> Result<CommandOutput> {
        let (_, script) = self.record(dir, "pull --ff");
        Ok(Self::ok_or("git pull --ff", script.pull_ok))
    }

    async fn branch_exists(&self, dir: &Path, branch: &str) -> Result<CommandOutput> {
        let (_, script) = self.record(dir, format!("show-ref {branch}"));
        Ok(Self::ok_or("git show-ref", script.branch_exists))
    }

    async fn create_branch(&self, dir: &Path, branch: &str) -> Result<CommandOutput> {
        self.record(dir, format!("checkout -b {branch}"));
        Ok(Self::ok_or("git checkout -b", true))
    }

    async fn head_commit(&self, dir: &Path) -> Result<CommandOutput> {
        let repo = Self::repo_name(dir);
        let head = self.state.lock().unwrap().entry(repo).or_default().head;
        Ok(Self::output("git rev-parse HEAD", 0, &format!("{head:040x}\n"), ""))
    }

    async fn merge(
        &self,
        dir: &Path,
        source_ref: &str,
        options: &[String],
    ) -> Result<CommandOutput> {
        let mut op = String::from("merge --no-edit");
        for option in options {
            op.push(' ');
            op.push_str(option);
        }
        op.push(' ');
        op.push_str(source_ref);
        let (repo, script) = self.record(dir, op);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !script.merge_delay.is_zero() {
            tokio::time::sleep(script.merge_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        assert!(
            script.merge != MergeScript::Panic,
            "scripted panic in merge"
        );

        let mut state = self.state.lock().unwrap();
        let repo_state = state.entry(repo).or_default();
        let command = "git merge";
        Ok(match script.merge {
            MergeScript::UpToDate => Self::output(command, 0, "Already up to date.\n", ""),
            MergeScript::Merged => {
                repo_state.head += 1;
                Self::output(command, 0, "Merge made by the 'ort' strategy.\n", "")
            }
            MergeScript::Conflict => {
                repo_state.dirty = true;
                Self::output(
                    command,
                    1,
                    "CONFLICT (content): Merge conflict in a.txt\n",
                    "",
                )
            }
            MergeScript::Fails => Self::output(
                command,
                128,
                "",
                &format!("merge: {source_ref} - not something we can merge\n"),
            ),
            MergeScript::SpawnError => {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "git not found",
                )));
            }
            MergeScript::Panic => unreachable!(),
        })
    }

    async fn status(&self, dir: &Path) -> Result<CommandOutput> {
        let repo = Self::repo_name(dir);
        let dirty = self.state.lock().unwrap().entry(repo).or_default().dirty;
        let stdout = if dirty { "UU a.txt\n" } else { "" };
        Ok(Self::output("git status --porcelain", 0, stdout, ""))
    }
}

/// One recorded hook invocation
#[derive(Debug, Clone)]
pub struct HookCall {
    /// Command string
    pub command: String,
    /// Exported environment
    pub env: HashMap<String, String>,
}

impl HookCall {
    /// Value of the variable ending in `suffix`, whatever the prefix
    pub fn var(&self, suffix: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k.ends_with(suffix))
            .map(|(_, v)| v.as_str())
    }
}

/// Mock [`HookRunner`]
///
/// Exits 0 with empty output unless scripted per (command, repository).
#[derive(Default)]
pub struct MockHooks {
    exit_codes: Mutex<HashMap<(String, String), i32>>,
    outputs: Mutex<HashMap<(String, String), String>>,
    calls: Mutex<Vec<HookCall>>,
}

impl MockHooks {
    /// Empty mock
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `command` exit with `code` for `repo`
    pub fn exit_with(&self, command: &str, repo: &str, code: i32) {
        self.exit_codes
            .lock()
            .unwrap()
            .insert((command.to_string(), repo.to_string()), code);
    }

    /// Make `command` print `stdout` for `repo`
    pub fn print(&self, command: &str, repo: &str, stdout: &str) {
        self.outputs
            .lock()
            .unwrap()
            .insert((command.to_string(), repo.to_string()), stdout.to_string());
    }

    /// All calls so far
    pub fn calls(&self) -> Vec<HookCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Commands run for one repository, in order
    pub fn commands_for(&self, repo: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.var("REPO_LOCAL_NAME") == Some(repo))
            .map(|c| c.command)
            .collect()
    }
}

#[async_trait]
impl HookRunner for MockHooks {
    async fn run_hook(&self, command: &str, env: &[(String, String)]) -> Result<CommandOutput> {
        let call = HookCall {
            command: command.to_string(),
            env: env.iter().cloned().collect(),
        };
        let key = (
            command.to_string(),
            call.var("REPO_LOCAL_NAME").unwrap_or_default().to_string(),
        );
        self.calls.lock().unwrap().push(call);

        let exit_code = self.exit_codes.lock().unwrap().get(&key).copied().unwrap_or(0);
        let stdout = self
            .outputs
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_default();
        Ok(CommandOutput {
            command: command.to_string(),
            exit_code: Some(exit_code),
            stdout,
            stderr: String::new(),
            duration: Duration::from_millis(1),
        })
    }
}
