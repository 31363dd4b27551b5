use super::{walk, VaultStore};
use crate::error::{Result, VaultError};
use crate::model::{IndexEntry, NoteInput, NoteRecord, Overrides};
use crate::paths::{join_rel, path_key, sanitize_note_path, unique_path};
use crate::report::{Diagnostic, SaveReport};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Writes `content` to `path` unless the file already holds exactly those
/// bytes. Returns whether a write happened.
fn write_if_changed(path: &Path, content: &str) -> Result<bool> {
    if let Ok(existing) = fs::read(path) {
        if existing == content.as_bytes() {
            return Ok(false);
        }
    }

    let dir = path
        .parent()
        .ok_or_else(|| VaultError::Store(format!("{} has no parent", path.display())))?;
    fs::create_dir_all(dir).map_err(VaultError::io_at(dir))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_file = dir.join(format!(".{}.{}.tmp", name, Uuid::new_v4()));
    fs::write(&tmp_file, content).map_err(VaultError::io_at(&tmp_file))?;
    if let Err(e) = fs::rename(&tmp_file, path) {
        let _ = fs::remove_file(&tmp_file);
        return Err(VaultError::io_at(path)(e));
    }
    Ok(true)
}

impl VaultStore {
    /// Persists the complete note set. Returns true once the index is written.
    pub fn save(&self, notes: &[NoteInput]) -> bool {
        self.save_with_report(notes).committed
    }

    pub fn save_with_report(&self, notes: &[NoteInput]) -> SaveReport {
        let mut report = SaveReport::default();

        if let Err(e) = fs::create_dir_all(&self.root) {
            warn!(root = %self.root.display(), error = %e, "cannot create vault root");
            report
                .diagnostics
                .push(Diagnostic::error(format!("cannot create vault root: {}", e)));
            return report;
        }

        let previous = self.index().read();
        report.diagnostics.extend(previous.diagnostics);
        let previous: HashMap<String, IndexEntry> = previous
            .entries
            .into_iter()
            .map(|entry| {
                let path = sanitize_note_path(&entry.path);
                (path_key(&path), IndexEntry { path, ..entry })
            })
            .collect();

        let now = Utc::now();
        let defaults = self.defaults(now, now);
        let mut taken = HashSet::new();

        for input in notes {
            let requested = sanitize_note_path(input.raw_path());
            let path = unique_path(&requested, &taken);
            let key = path_key(&path);
            taken.insert(key.clone());
            if path != requested {
                debug!(requested = %requested, assigned = %path, "note path already taken");
                report.renamed.push((requested, path.clone()));
            }

            let prior = previous.get(&key);
            match write_if_changed(&join_rel(&self.root, &path), &input.markdown) {
                Ok(true) => report.written += 1,
                Ok(false) => report.unchanged += 1,
                Err(e) => {
                    warn!(path = %path, error = %e, "cannot write note");
                    report
                        .diagnostics
                        .push(Diagnostic::warning(format!("cannot write note: {}", e)).at(&path));
                    report.skipped += 1;
                    // Keep the old entry so the file on disk is not treated as deleted.
                    if let Some(prior) = prior {
                        report.entries.push(prior.clone());
                    }
                    continue;
                }
            }

            let mut overrides = Overrides::from(input);
            if let Some(prior) = prior {
                if overrides.id.as_deref().map_or(true, |id| id.trim().is_empty()) {
                    overrides.id = Some(prior.id.clone());
                }
                overrides.created_at = overrides.created_at.or(prior.created_at);
            }
            let record = NoteRecord::build(path, input.markdown.clone(), overrides, &defaults);
            report.entries.push(record.index_entry());
        }

        if let Err(e) = self.index().write(&report.entries) {
            warn!(error = %e, "cannot write vault index");
            report
                .diagnostics
                .push(Diagnostic::error(format!("cannot write index: {}", e)));
            return report;
        }
        report.committed = true;

        let kept: HashSet<String> = report.entries.iter().map(|e| path_key(&e.path)).collect();
        for (key, entry) in &previous {
            if kept.contains(key) {
                continue;
            }
            self.remove_note(&entry.path, &mut report);
        }
        report.removed.sort();

        info!(
            written = report.written,
            unchanged = report.unchanged,
            removed = report.removed.len(),
            "vault saved"
        );
        report
    }

    fn remove_note(&self, path: &str, report: &mut SaveReport) {
        let full = join_rel(&self.root, path);
        match fs::remove_file(&full) {
            Ok(()) => report.removed.push(path.to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path, error = %e, "cannot delete note");
                report
                    .diagnostics
                    .push(Diagnostic::warning(format!("cannot delete note: {}", e)).at(path));
                return;
            }
        }

        let Some(dir) = full.parent() else {
            return;
        };
        if let Err(e) = walk::prune_empty_dirs(&self.root, dir) {
            warn!(path = %path, error = %e, "cannot prune empty directories");
            report
                .diagnostics
                .push(Diagnostic::warning(format!("cannot prune directories: {}", e)).at(path));
        }
    }
}
