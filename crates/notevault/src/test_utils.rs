//! Test doubles shared by unit tests and downstream crates' tests.

use crate::backup::{CommandOutput, CommandRunner};
use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

/// A scripted stand-in for the git binary.
///
/// It records every invocation, tracks how many passes overlap, and can hold
/// `commit` until the test releases a permit on the gate.
pub struct FakeGit {
    installed: bool,
    identity_set: bool,
    dirty: bool,
    nothing_to_commit: bool,
    commit_error: Option<String>,
    gate: Option<Arc<Semaphore>>,
    commit_started: Notify,
    calls: Mutex<Vec<Vec<String>>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl Default for FakeGit {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGit {
    pub fn new() -> Self {
        Self {
            installed: true,
            identity_set: true,
            dirty: true,
            nothing_to_commit: false,
            commit_error: None,
            gate: None,
            commit_started: Notify::new(),
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn missing(mut self) -> Self {
        self.installed = false;
        self
    }

    pub fn without_identity(mut self) -> Self {
        self.identity_set = false;
        self
    }

    pub fn clean(mut self) -> Self {
        self.dirty = false;
        self
    }

    pub fn nothing_to_commit(mut self) -> Self {
        self.nothing_to_commit = true;
        self
    }

    pub fn failing_commit(mut self, stderr: &str) -> Self {
        self.commit_error = Some(stderr.to_string());
        self
    }

    /// Each `commit` waits for one permit from `gate`.
    pub fn with_commit_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Resolves once a `commit` call has started.
    pub async fn commit_started(&self) {
        self.commit_started.notified().await
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn verbs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.into_iter().next())
            .collect()
    }

    pub fn passes(&self) -> usize {
        self.verbs().iter().filter(|v| *v == "--version").count()
    }

    pub fn commit_messages(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.first().map(String::as_str) == Some("commit"))
            .filter_map(|c| c.get(2).cloned())
            .collect()
    }

    pub fn max_concurrent_passes(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn begin(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
    }

    fn end(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommandRunner for FakeGit {
    async fn run(&self, cwd: &Path, args: &[&str]) -> io::Result<CommandOutput> {
        self.calls
            .lock()
            .unwrap()
            .push(args.iter().map(|a| a.to_string()).collect());

        if !self.installed {
            return Err(io::Error::new(io::ErrorKind::NotFound, "git not found"));
        }

        let out = match args {
            ["--version"] => {
                self.begin();
                CommandOutput::ok("git version 2.43.0\n")
            }
            ["init"] => {
                std::fs::create_dir_all(cwd.join(".git"))?;
                CommandOutput::ok("Initialized empty Git repository\n")
            }
            ["config", "--get", _] if self.identity_set => CommandOutput::ok("Someone\n"),
            ["config", "--get", _] => CommandOutput::failed(""),
            ["config", _, _] => CommandOutput::ok(""),
            ["status", ..] if self.dirty => CommandOutput::ok(" M note.md\n"),
            ["status", ..] => {
                self.end();
                CommandOutput::ok("")
            }
            ["add", ..] => CommandOutput::ok(""),
            ["commit", ..] => {
                self.commit_started.notify_one();
                if let Some(gate) = &self.gate {
                    if let Ok(permit) = gate.acquire().await {
                        permit.forget();
                    }
                }
                if self.nothing_to_commit {
                    self.end();
                    CommandOutput {
                        success: false,
                        stdout: "nothing to commit, working tree clean\n".into(),
                        stderr: String::new(),
                    }
                } else if let Some(stderr) = &self.commit_error {
                    self.end();
                    CommandOutput::failed(stderr.clone())
                } else {
                    CommandOutput::ok("[main abc1234] vault backup\n")
                }
            }
            ["rev-parse", ..] => {
                self.end();
                CommandOutput::ok("abc1234\n")
            }
            _ => CommandOutput::failed(format!("unexpected git call: {:?}", args)),
        };
        Ok(out)
    }
}
