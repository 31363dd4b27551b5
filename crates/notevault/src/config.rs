//! # Configuration
//!
//! Settings are loaded by [`clapfig`] from `notevault.toml` in the application
//! data directory, layered under `NOTEVAULT__*` environment variables. Every
//! key has a compiled default, so a missing or broken file is never fatal.
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `vault_root` | `<app-data>/vault` | Directory holding the notes |
//! | `backup_debounce_ms` | `4000` | Quiet period before an automatic backup |
//! | `git_program` | `git` | Binary used for backups |
//! | `default_notebook` | `Notes` | Notebook for notes at the vault root |
//! | `snippet_length` | `160` | Characters kept in derived snippets |
//!
//! The enabled/disabled state of backups is *not* configuration; it is a user
//! toggle persisted separately (see [`crate::backup::SettingsStore`]).

use confique::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const VAULT_DIR: &str = "vault";

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// Where notes live. Relative paths resolve against the app data directory.
    pub vault_root: Option<PathBuf>,

    /// Milliseconds of quiet before a scheduled backup runs.
    #[config(default = 4000)]
    pub backup_debounce_ms: u64,

    #[config(default = "git")]
    pub git_program: String,

    #[config(default = "Notes")]
    pub default_notebook: String,

    #[config(default = 160)]
    pub snippet_length: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            vault_root: None,
            backup_debounce_ms: 4000,
            git_program: "git".to_string(),
            default_notebook: "Notes".to_string(),
            snippet_length: 160,
        }
    }
}

impl VaultConfig {
    pub fn vault_root(&self, app_data: &Path) -> PathBuf {
        match &self.vault_root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => app_data.join(root),
            None => app_data.join(VAULT_DIR),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.backup_debounce_ms)
    }
}
