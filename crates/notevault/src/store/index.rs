use crate::error::{Result, VaultError};
use crate::model::IndexEntry;
use crate::report::Diagnostic;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

pub const INDEX_FILE: &str = ".vault-index.json";

/// Result of reading the index. Never an error: a broken index reads as empty.
#[derive(Debug, Default)]
pub struct IndexRead {
    pub entries: Vec<IndexEntry>,
    pub rejected: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// The sidecar metadata index, `<vault>/.vault-index.json`.
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(vault_root: &Path) -> Self {
        Self {
            path: vault_root.join(INDEX_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> IndexRead {
        let mut out = IndexRead::default();

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return out,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "vault index unreadable");
                out.diagnostics
                    .push(Diagnostic::warning(format!("index unreadable: {}", e)));
                return out;
            }
        };

        let items = match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(items)) => items,
            Ok(_) => {
                warn!(path = %self.path.display(), "vault index is not a JSON array");
                out.diagnostics
                    .push(Diagnostic::warning("index is not a JSON array"));
                return out;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "vault index is corrupt");
                out.diagnostics
                    .push(Diagnostic::warning(format!("index is corrupt: {}", e)));
                return out;
            }
        };

        for (position, item) in items.into_iter().enumerate() {
            match serde_json::from_value::<IndexEntry>(item) {
                Ok(entry) => out.entries.push(entry),
                Err(e) => {
                    out.rejected += 1;
                    warn!(position, error = %e, "rejected vault index entry");
                    out.diagnostics.push(Diagnostic::warning(format!(
                        "index entry #{} rejected: {}",
                        position, e
                    )));
                }
            }
        }
        debug!(
            entries = out.entries.len(),
            rejected = out.rejected,
            "vault index read"
        );
        out
    }

    /// Replaces the whole index file with `entries`.
    pub fn write(&self, entries: &[IndexEntry]) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| VaultError::Store("index path has no parent".to_string()))?;
        fs::create_dir_all(dir).map_err(VaultError::io_at(dir))?;

        let content = serde_json::to_string_pretty(entries)?;

        let tmp_file = dir.join(format!(".vault-index-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_file, content).map_err(VaultError::io_at(&tmp_file))?;
        if let Err(e) = fs::rename(&tmp_file, &self.path) {
            let _ = fs::remove_file(&tmp_file);
            return Err(VaultError::IoAt {
                path: self.path.clone(),
                source: e,
            });
        }
        Ok(())
    }
}
