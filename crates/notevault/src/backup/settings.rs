use crate::error::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const SETTINGS_FILE: &str = ".vault-git-backup.json";

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Persists [`BackupSettings`] in the application data directory.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(app_data: &Path) -> Self {
        Self {
            path: app_data.join(SETTINGS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable settings mean the defaults.
    pub fn load(&self) -> BackupSettings {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return BackupSettings::default(),
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "ignoring corrupt backup settings");
            BackupSettings::default()
        })
    }

    pub fn save(&self, settings: &BackupSettings) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(VaultError::io_at(dir))?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, content).map_err(VaultError::io_at(&self.path))?;
        Ok(())
    }
}
