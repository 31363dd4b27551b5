use super::{walk, VaultStore};
use crate::model::{NoteRecord, Overrides};
use crate::paths::{join_rel, path_key, rel_string, sanitize_note_path};
use crate::report::{Diagnostic, LoadReport, LoadSource};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Creation and modification times of a file, falling back to `now`.
fn file_times(path: &Path, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let Ok(meta) = fs::metadata(path) else {
        return (now, now);
    };
    let modified = meta.modified().ok().map(DateTime::<Utc>::from);
    let created = meta.created().ok().map(DateTime::<Utc>::from).or(modified);
    (created.unwrap_or(now), modified.unwrap_or(now))
}

impl VaultStore {
    /// Returns every note in the vault, or `None` when nothing was found.
    pub fn load(&self) -> Option<Vec<NoteRecord>> {
        self.load_with_report().notes
    }

    pub fn load_with_report(&self) -> LoadReport {
        let now = Utc::now();
        let mut diagnostics = Vec::new();

        if let Err(e) = fs::create_dir_all(&self.root) {
            warn!(root = %self.root.display(), error = %e, "cannot create vault root");
            diagnostics.push(Diagnostic::error(format!("cannot create vault root: {}", e)));
        }

        let read = self.index().read();
        diagnostics.extend(read.diagnostics);

        let mut notes = Vec::new();
        let mut seen = HashSet::new();
        let mut stale_entries = 0;

        for entry in &read.entries {
            let path = sanitize_note_path(&entry.path);
            if !seen.insert(path_key(&path)) {
                diagnostics.push(Diagnostic::warning("duplicate index entry ignored").at(&path));
                continue;
            }
            let full = join_rel(&self.root, &path);
            let markdown = match fs::read_to_string(&full) {
                Ok(markdown) => markdown,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %path, "index entry has no file, dropping");
                    stale_entries += 1;
                    continue;
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "cannot read note");
                    diagnostics.push(Diagnostic::warning(format!("cannot read note: {}", e)).at(&path));
                    continue;
                }
            };
            let (created, modified) = file_times(&full, now);
            notes.push(NoteRecord::build(
                path,
                markdown,
                Overrides::from(entry),
                &self.defaults(created, modified),
            ));
        }

        if stale_entries > 0 {
            diagnostics.push(Diagnostic::info(format!(
                "{} index entries pointed at missing files",
                stale_entries
            )));
        }

        let from_index = !notes.is_empty();
        let adopted = self.adopt_unindexed(&mut notes, &mut seen, &mut diagnostics, now);

        let source = if from_index {
            LoadSource::Index
        } else if !notes.is_empty() {
            LoadSource::Scan
        } else {
            LoadSource::Empty
        };
        if from_index && adopted > 0 {
            info!(adopted, "adopted un-indexed notes");
            diagnostics.push(Diagnostic::info(format!("adopted {} un-indexed notes", adopted)));
        }

        notes.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(count = notes.len(), ?source, "vault loaded");

        LoadReport {
            notes: if notes.is_empty() { None } else { Some(notes) },
            source,
            adopted: if from_index { adopted } else { 0 },
            stale_entries,
            diagnostics,
        }
    }

    /// Adds every `.md` file under the root whose path was not already loaded.
    /// With an empty `seen` set this is the plain directory scan.
    fn adopt_unindexed(
        &self,
        notes: &mut Vec<NoteRecord>,
        seen: &mut HashSet<String>,
        diagnostics: &mut Vec<Diagnostic>,
        now: DateTime<Utc>,
    ) -> usize {
        let mut adopted = 0;
        for full in walk::markdown_files(&self.root) {
            let Some(rel) = rel_string(&self.root, &full) else {
                continue;
            };
            if !seen.insert(path_key(&rel)) {
                continue;
            }
            let markdown = match fs::read_to_string(&full) {
                Ok(markdown) => markdown,
                Err(e) => {
                    warn!(path = %rel, error = %e, "cannot read note");
                    diagnostics.push(Diagnostic::warning(format!("cannot read note: {}", e)).at(&rel));
                    continue;
                }
            };
            let (created, modified) = file_times(&full, now);
            notes.push(NoteRecord::build(
                rel,
                markdown,
                Overrides::default(),
                &self.defaults(created, modified),
            ));
            adopted += 1;
        }
        adopted
    }
}

#[cfg(test)]
mod tests {
    use crate::store::{StoreOptions, VaultStore, INDEX_FILE};
    use crate::report::LoadSource;
    use std::fs;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> VaultStore {
        VaultStore::new(dir.path(), StoreOptions::default())
    }

    #[test]
    fn test_empty_vault_loads_none() {
        let dir = TempDir::new().unwrap();
        let report = store(&dir).load_with_report();
        assert!(report.notes.is_none());
        assert_eq!(report.source, LoadSource::Empty);
    }

    #[test]
    fn test_missing_root_is_created() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("fresh");
        let vault = VaultStore::new(&root, StoreOptions::default());
        assert!(vault.load().is_none());
        assert!(root.is_dir());
    }

    #[test]
    fn test_scan_fallback_derives_metadata() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("Inbox")).unwrap();
        fs::write(dir.path().join("Inbox/Hello.md"), "# Hello\n\nWorld #demo").unwrap();

        let report = store(&dir).load_with_report();
        assert_eq!(report.source, LoadSource::Scan);
        let notes = report.notes.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].path, "Inbox/Hello.md");
        assert_eq!(notes[0].title, "Hello");
        assert_eq!(notes[0].notebook, "Inbox");
        assert_eq!(notes[0].tags, vec!["demo"]);
        assert!(!notes[0].id.is_empty());
    }

    #[test]
    fn test_corrupt_index_falls_back_to_scan() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(INDEX_FILE), "garbage").unwrap();
        fs::write(dir.path().join("a.md"), "# A").unwrap();

        let report = store(&dir).load_with_report();
        assert_eq!(report.source, LoadSource::Scan);
        assert_eq!(report.notes.unwrap().len(), 1);
        assert!(!report.diagnostics.is_empty());
    }

    #[test]
    fn test_index_metadata_wins_and_stale_entries_drop() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.md"), "# From Body").unwrap();
        fs::write(
            dir.path().join(INDEX_FILE),
            r#"[
                {"id":"keep-me","path":"a.md","title":"From Index","tags":["x"]},
                {"id":"gone","path":"missing.md","title":"Gone"}
            ]"#,
        )
        .unwrap();

        let report = store(&dir).load_with_report();
        assert_eq!(report.source, LoadSource::Index);
        assert_eq!(report.stale_entries, 1);
        let notes = report.notes.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, "keep-me");
        assert_eq!(notes[0].title, "From Index");
        assert_eq!(notes[0].tags, vec!["x"]);
    }

    #[test]
    fn test_orphan_files_are_adopted_next_to_index() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.md"), "# A").unwrap();
        fs::write(dir.path().join("dropped-in.md"), "# Dropped").unwrap();
        fs::write(dir.path().join(INDEX_FILE), r#"[{"path":"a.md"}]"#).unwrap();

        let report = store(&dir).load_with_report();
        assert_eq!(report.source, LoadSource::Index);
        assert_eq!(report.adopted, 1);
        let notes = report.notes.unwrap();
        let paths: Vec<_> = notes.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "dropped-in.md"]);
        assert_eq!(notes[1].title, "Dropped");
    }

    #[test]
    fn test_index_paths_are_sanitized_on_load() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(dir.path().join("etc/passwd.md"), "inside").unwrap();
        fs::write(dir.path().join(INDEX_FILE), r#"[{"path":"../../etc/passwd"}]"#).unwrap();

        let notes = store(&dir).load().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].path, "etc/passwd.md");
        assert_eq!(notes[0].markdown, "inside");
    }
}
