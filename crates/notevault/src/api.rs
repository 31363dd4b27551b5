//! # API Facade
//!
//! [`Vault`] is the single entry point a UI talks to. It wires the store, the
//! attachment manager and the backup scheduler together and hides their errors:
//!
//! - Operations return plain values or sentinels (`bool`, `Option`), never
//!   `Result`. Failures are logged with `tracing` and, where a report variant
//!   exists (`*_with_report`), returned as structured diagnostics.
//! - Every mutation that touches the vault schedules a backup with a reason
//!   (`notes-save`, `attachment-save`, `attachment-clone`).
//! - Backup calls never block on a pass; `run_backup_now` only waits for the
//!   scheduler to accept the request.
//!
//! The facade does no I/O of its own beyond what the components do, and no
//! presentation: the CLI (or any other client) renders what it returns.

use crate::attachments::{AttachmentManager, CloneOutcome, StoredAttachment};
use crate::backup::{BackupScheduler, BackupState};
use crate::model::{NoteInput, NoteRecord};
use crate::report::{Diagnostic, LoadReport, SaveReport};
use crate::store::VaultStore;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tokio::sync::watch;
use tracing::warn;

pub const REASON_NOTES_SAVE: &str = "notes-save";
pub const REASON_ATTACHMENT_SAVE: &str = "attachment-save";
pub const REASON_ATTACHMENT_CLONE: &str = "attachment-clone";
pub const REASON_MANUAL: &str = "manual";

pub struct Vault {
    store: VaultStore,
    attachments: AttachmentManager,
    backup: BackupScheduler,
}

impl Vault {
    pub fn new(store: VaultStore, backup: BackupScheduler) -> Self {
        let attachments = AttachmentManager::new(store.root());
        Self {
            store,
            attachments,
            backup,
        }
    }

    pub fn root(&self) -> &Path {
        self.store.root()
    }

    pub fn load(&self) -> Option<Vec<NoteRecord>> {
        self.store.load()
    }

    pub fn load_with_report(&self) -> LoadReport {
        self.store.load_with_report()
    }

    /// Replaces the vault contents with `notes`.
    pub fn save(&self, notes: &[NoteInput]) -> bool {
        self.save_with_report(notes).committed
    }

    pub fn save_with_report(&self, notes: &[NoteInput]) -> SaveReport {
        let report = self.store.save_with_report(notes);
        if report.committed {
            self.backup.schedule(REASON_NOTES_SAVE);
        }
        report
    }

    /// Saves an untyped payload. Returns false when it is not an array;
    /// items that do not parse as notes are skipped.
    pub fn save_json(&self, payload: &Value) -> bool {
        self.save_json_with_report(payload)
            .is_some_and(|report| report.committed)
    }

    /// `None` when the payload is not an array.
    pub fn save_json_with_report(&self, payload: &Value) -> Option<SaveReport> {
        let Some((notes, rejected)) = parse_payload(payload) else {
            warn!("save payload is not an array");
            return None;
        };
        let mut report = self.save_with_report(&notes);
        report.skipped += rejected.len();
        report.diagnostics.extend(rejected);
        Some(report)
    }

    pub fn store_attachment(
        &self,
        note_path: &str,
        file_name: &str,
        base64_data: &str,
    ) -> Option<StoredAttachment> {
        match self.attachments.store(note_path, file_name, base64_data) {
            Ok(stored) => {
                self.backup.schedule(REASON_ATTACHMENT_SAVE);
                Some(stored)
            }
            Err(e) => {
                warn!(note = note_path, file = file_name, error = %e, "cannot store attachment");
                None
            }
        }
    }

    /// Copies the attachments `markdown` links to so the note at
    /// `target_path` owns its own files. On failure the markdown comes back
    /// unchanged.
    pub fn clone_attachment_links(
        &self,
        source_path: &str,
        target_path: &str,
        markdown: &str,
    ) -> CloneOutcome {
        match self.attachments.clone_links(source_path, target_path, markdown) {
            Ok(outcome) => {
                if outcome.copied_count > 0 {
                    self.backup.schedule(REASON_ATTACHMENT_CLONE);
                }
                outcome
            }
            Err(e) => {
                warn!(source = source_path, target = target_path, error = %e, "cannot clone attachments");
                CloneOutcome::unchanged(markdown)
            }
        }
    }

    pub fn backup_status(&self) -> BackupState {
        self.backup.status()
    }

    pub async fn set_backup_enabled(&self, enabled: bool) -> BackupState {
        self.backup.set_enabled(enabled).await
    }

    pub async fn run_backup_now(&self) -> BackupState {
        self.backup.flush(Some(REASON_MANUAL.to_string())).await
    }

    /// Completes a pending backup (if any) without a new reason.
    pub async fn flush_backup(&self) -> BackupState {
        self.backup.flush(None).await
    }

    pub fn subscribe_backup(&self) -> watch::Receiver<BackupState> {
        self.backup.subscribe()
    }
}

/// Splits a JSON array into parsed notes and per-item rejections.
fn parse_payload(payload: &Value) -> Option<(Vec<NoteInput>, Vec<Diagnostic>)> {
    let items = payload.as_array()?;
    let mut notes = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();

    for (position, item) in items.iter().enumerate() {
        match NoteInput::deserialize(item) {
            Ok(note) => notes.push(note),
            Err(e) => {
                warn!(position, error = %e, "skipping malformed note");
                rejected.push(Diagnostic::warning(format!(
                    "note #{} skipped: {}",
                    position, e
                )));
            }
        }
    }
    Some((notes, rejected))
}
