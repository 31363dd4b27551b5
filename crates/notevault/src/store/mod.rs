//! # Vault Store
//!
//! The store owns one directory (the vault root) and keeps two things in sync:
//! the Markdown files themselves and the sidecar index `.vault-index.json`.
//!
//! ## Files Are Truth
//!
//! The index is a cache. Whenever the two disagree, the files win:
//!
//! - An index entry whose file is missing is dropped on load (stale entry).
//! - A `.md` file nobody indexed is adopted on load with derived metadata.
//! - A missing or corrupt index falls back to a full directory scan.
//!
//! ## Saving
//!
//! A save receives the *complete* set of notes. Anything the previous index
//! knew about that is not in the new set is deleted from disk, and directories
//! left empty by that deletion are pruned. Bodies whose bytes did not change are
//! not rewritten, so the files' modification times (and therefore backups) only
//! move when something actually changed.
//!
//! Both sides write through a temp file and a rename, so a crash never leaves a
//! half-written index or note behind.
//!
//! ## Modules
//!
//! - [`index`]: reading and writing the index file
//! - [`walk`]: non-recursive scan and empty-directory pruning
//! - `hydrate`: [`VaultStore::load`]
//! - `writer`: [`VaultStore::save`]

pub mod index;
pub mod walk;

mod hydrate;
mod writer;

use crate::config::VaultConfig;
use crate::model::{RecordDefaults, DEFAULT_SNIPPET_LENGTH};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

pub use index::{IndexRead, IndexStore, INDEX_FILE};

pub const DEFAULT_NOTEBOOK: &str = "Notes";

/// Knobs that shape derived metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub default_notebook: String,
    pub snippet_length: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            default_notebook: DEFAULT_NOTEBOOK.to_string(),
            snippet_length: DEFAULT_SNIPPET_LENGTH,
        }
    }
}

impl From<&VaultConfig> for StoreOptions {
    fn from(config: &VaultConfig) -> Self {
        Self {
            default_notebook: config.default_notebook.clone(),
            snippet_length: config.snippet_length,
        }
    }
}

pub struct VaultStore {
    root: PathBuf,
    options: StoreOptions,
}

impl VaultStore {
    pub fn new(root: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    fn index(&self) -> IndexStore {
        IndexStore::new(&self.root)
    }

    fn defaults(&self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> RecordDefaults<'_> {
        RecordDefaults {
            created_at,
            updated_at,
            notebook: &self.options.default_notebook,
            snippet_length: self.options.snippet_length,
        }
    }
}
