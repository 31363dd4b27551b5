//! # Git Backups
//!
//! The vault directory doubles as a git repository. After edits settle, the
//! whole tree is staged and committed, giving the user a history they can
//! inspect or restore with ordinary git tools.
//!
//! ## Lifecycle
//!
//! ```text
//! save ──► schedule(reason) ──► [debounce] ──► pass ──► commit
//!                  ▲                              │
//!                  └── changes during a pass ─────┘ (exactly one rerun)
//! ```
//!
//! - **Debounce**: every `schedule` restarts the timer, so a burst of saves
//!   produces one commit.
//! - **Single flight**: at most one pass runs at a time. Requests that arrive
//!   while a pass is running collapse into one follow-up pass.
//! - **Degradation**: a machine without git reports `available = false` and
//!   never errors.
//!
//! The scheduler is an actor task owning all mutable state; callers talk to it
//! through [`BackupScheduler`] and observe it through a `watch` channel of
//! [`BackupState`].
//!
//! The enabled flag is persisted in `<app-data>/.vault-git-backup.json`.

mod pass;
mod runner;
mod scheduler;
mod settings;

pub use pass::{run_pass, Identity, PassOutcome};
pub use runner::{CommandOutput, CommandRunner, GitRunner};
pub use scheduler::{BackupScheduler, SchedulerOptions, DEFAULT_DEBOUNCE};
pub use settings::{BackupSettings, SettingsStore, SETTINGS_FILE};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot of the backup subsystem, as shown in a status bar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupState {
    pub enabled: bool,
    /// `None` until the first pass has probed for git.
    pub available: Option<bool>,
    pub repo_ready: bool,
    /// Changes exist that no successful pass has covered yet.
    pub dirty: bool,
    pub busy: bool,
    /// A pass is scheduled, or a rerun is owed after the current one.
    pub pending: bool,
    pub last_reason: Option<String>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_commit_at: Option<DateTime<Utc>>,
    pub last_commit_hash: Option<String>,
    pub last_error: Option<String>,
    /// Completed passes since start-up.
    pub runs: u64,
}

impl BackupState {
    fn apply(&mut self, outcome: PassOutcome, finished_at: DateTime<Utc>) {
        self.runs += 1;
        self.last_run_at = Some(finished_at);
        self.available = Some(outcome.available);
        self.repo_ready = outcome.repo_ready;

        if let Some(hash) = outcome.commit_hash {
            self.last_commit_hash = Some(hash);
            self.last_commit_at = Some(finished_at);
        }
        match outcome.error {
            Some(error) => self.last_error = Some(error),
            None => {
                self.last_error = None;
                if outcome.available {
                    self.dirty = self.pending;
                }
            }
        }
    }
}
