use super::runner::{CommandOutput, CommandRunner};
use chrono::{SecondsFormat, Utc};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};

pub const DEFAULT_AUTHOR_NAME: &str = "Notevault Backup";
pub const DEFAULT_AUTHOR_EMAIL: &str = "backup@notevault.local";

/// Commit identity written into the repository config when none is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: DEFAULT_AUTHOR_NAME.to_string(),
            email: DEFAULT_AUTHOR_EMAIL.to_string(),
        }
    }
}

/// What one backup pass found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutcome {
    pub available: bool,
    pub repo_ready: bool,
    pub commit_hash: Option<String>,
    pub error: Option<String>,
}

impl PassOutcome {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

pub fn commit_message(reason: &str) -> String {
    format!(
        "vault backup ({}) {}",
        reason,
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// Fails the pass with `$context: <git output>` unless the command succeeded.
macro_rules! require {
    ($outcome:ident, $result:expr, $context:literal) => {
        match $result {
            Ok(out) if out.success => out,
            Ok(out) => {
                $outcome.error = Some(format!(concat!($context, ": {}"), out.message()));
                return $outcome;
            }
            Err(e) => {
                $outcome.error = Some(format!(concat!($context, ": {}"), e));
                return $outcome;
            }
        }
    };
}

/// Runs one complete backup of `root`: probe, init, identity, stage, commit.
pub async fn run_pass(
    runner: &dyn CommandRunner,
    root: &Path,
    reason: &str,
    identity: &Identity,
) -> PassOutcome {
    if let Err(e) = std::fs::create_dir_all(root) {
        return PassOutcome::failed(format!("cannot create vault directory: {}", e));
    }

    let mut outcome = PassOutcome::default();
    match runner.run(root, &["--version"]).await {
        Ok(out) if out.success => outcome.available = true,
        Ok(out) => {
            warn!(output = %out.message(), "git --version failed");
            outcome.error = Some(format!("git is not usable: {}", out.message()));
            return outcome;
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("git not installed, skipping backup");
            return outcome;
        }
        Err(e) => {
            outcome.error = Some(format!("cannot run git: {}", e));
            return outcome;
        }
    }

    if !root.join(".git").exists() {
        require!(outcome, runner.run(root, &["init"]).await, "git init failed");
        info!(root = %root.display(), "initialised backup repository");
    }
    outcome.repo_ready = true;

    for (key, value) in [("user.name", &identity.name), ("user.email", &identity.email)] {
        let current = runner.run(root, &["config", "--get", key]).await;
        let is_set = matches!(&current, Ok(out) if out.success && !out.stdout.trim().is_empty());
        if !is_set {
            require!(
                outcome,
                runner.run(root, &["config", key, value.as_str()]).await,
                "git config failed"
            );
        }
    }

    let status = require!(
        outcome,
        runner.run(root, &["status", "--porcelain"]).await,
        "git status failed"
    );
    if status.stdout.trim().is_empty() {
        debug!("vault unchanged, nothing to back up");
        return outcome;
    }

    require!(outcome, runner.run(root, &["add", "-A"]).await, "git add failed");

    let message = commit_message(reason);
    match runner
        .run(root, &["commit", "-m", message.as_str(), "--no-verify"])
        .await
    {
        Ok(out) if out.success => {}
        Ok(out) if is_nothing_to_commit(&out) => return outcome,
        Ok(out) => {
            outcome.error = Some(format!("git commit failed: {}", out.message()));
            return outcome;
        }
        Err(e) => {
            outcome.error = Some(format!("git commit failed: {}", e));
            return outcome;
        }
    }

    match runner.run(root, &["rev-parse", "--short", "HEAD"]).await {
        Ok(out) if out.success => {
            let hash = out.stdout.trim().to_string();
            info!(hash = %hash, reason, "vault backup committed");
            outcome.commit_hash = Some(hash);
        }
        // The commit exists even if the hash lookup failed.
        _ => warn!("commit succeeded but HEAD could not be resolved"),
    }
    outcome
}

fn is_nothing_to_commit(out: &CommandOutput) -> bool {
    let text = format!("{}\n{}", out.stdout, out.stderr);
    text.contains("nothing to commit") || text.contains("nothing added to commit")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeGit;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_git_is_unavailable_not_error() {
        let dir = TempDir::new().unwrap();
        let git = FakeGit::new().missing();
        let outcome = run_pass(&git, dir.path(), "test", &Identity::default()).await;
        assert_eq!(outcome, PassOutcome::unavailable());
    }

    #[tokio::test]
    async fn test_first_pass_inits_sets_identity_and_commits() {
        let dir = TempDir::new().unwrap();
        let git = FakeGit::new().without_identity();
        let outcome = run_pass(&git, dir.path(), "save", &Identity::default()).await;

        assert!(outcome.available);
        assert!(outcome.repo_ready);
        assert_eq!(outcome.commit_hash.as_deref(), Some("abc1234"));
        assert_eq!(outcome.error, None);

        let verbs = git.verbs();
        assert_eq!(
            verbs,
            vec![
                "--version",
                "init",
                "config",
                "config",
                "config",
                "config",
                "status",
                "add",
                "commit",
                "rev-parse"
            ]
        );
        assert!(git.calls().contains(&vec![
            "config".to_string(),
            "user.name".to_string(),
            DEFAULT_AUTHOR_NAME.to_string()
        ]));
        let messages = git.commit_messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("vault backup (save) "));
    }

    #[tokio::test]
    async fn test_existing_identity_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let git = FakeGit::new();
        run_pass(&git, dir.path(), "save", &Identity::default()).await;

        let sets = git
            .calls()
            .into_iter()
            .filter(|c| c.first().map(String::as_str) == Some("config") && c[1] != "--get")
            .count();
        assert_eq!(sets, 0);
    }

    #[tokio::test]
    async fn test_clean_tree_skips_commit() {
        let dir = TempDir::new().unwrap();
        let git = FakeGit::new().clean();
        let outcome = run_pass(&git, dir.path(), "save", &Identity::default()).await;

        assert!(outcome.repo_ready);
        assert_eq!(outcome.commit_hash, None);
        assert_eq!(outcome.error, None);
        assert!(!git.verbs().contains(&"commit".to_string()));
    }

    #[tokio::test]
    async fn test_nothing_to_commit_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let git = FakeGit::new().nothing_to_commit();
        let outcome = run_pass(&git, dir.path(), "save", &Identity::default()).await;
        assert_eq!(outcome.error, None);
        assert_eq!(outcome.commit_hash, None);
    }

    #[tokio::test]
    async fn test_commit_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let git = FakeGit::new().failing_commit("fatal: disk full");
        let outcome = run_pass(&git, dir.path(), "save", &Identity::default()).await;
        assert_eq!(outcome.error.as_deref(), Some("git commit failed: fatal: disk full"));
        assert!(outcome.available);
    }
}
