//! # Context Setup
//!
//! Two directories matter:
//!
//! - **App data**: per-user state that is not part of the vault
//!   (`notevault.toml`, the backup toggle `.vault-git-backup.json`). Resolved
//!   from, in order: an explicit override (the CLI's `--data`), the
//!   `NOTEVAULT_DATA` environment variable, the OS data directory.
//! - **Vault root**: the notes themselves. `vault_root` from the config, else
//!   `<app-data>/vault`.
//!
//! Keeping the toggle outside the vault means it is never committed by the
//! backup it controls.
//!
//! [`initialize`] spawns the backup actor, so it must run inside a tokio
//! runtime.

use crate::api::Vault;
use crate::backup::{BackupScheduler, GitRunner, Identity, SchedulerOptions, SettingsStore};
use crate::config::VaultConfig;
use crate::error::{Result, VaultError};
use crate::store::{StoreOptions, VaultStore};
use clapfig::{Clapfig, SearchMode, SearchPath};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub const DATA_ENV: &str = "NOTEVAULT_DATA";
pub const CONFIG_FILE: &str = "notevault.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultPaths {
    pub app_data: PathBuf,
    pub vault_root: PathBuf,
}

pub struct VaultContext {
    pub vault: Vault,
    pub paths: VaultPaths,
    pub config: VaultConfig,
}

pub fn resolve_app_data(data_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = data_override {
        return Ok(path);
    }
    if let Some(path) = std::env::var_os(DATA_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    ProjectDirs::from("com", "notevault", "notevault")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| VaultError::Store("cannot determine the user data directory".to_string()))
}

pub fn load_config(app_data: &Path) -> VaultConfig {
    Clapfig::builder::<VaultConfig>()
        .app_name("notevault")
        .file_name(CONFIG_FILE)
        .search_paths(vec![SearchPath::Path(app_data.to_path_buf())])
        .search_mode(SearchMode::Merge)
        .strict(false)
        .load()
        .unwrap_or_default()
}

pub fn initialize(data_override: Option<PathBuf>) -> Result<VaultContext> {
    let app_data = resolve_app_data(data_override)?;
    let config = load_config(&app_data);
    let paths = VaultPaths {
        vault_root: config.vault_root(&app_data),
        app_data,
    };
    debug!(
        app_data = %paths.app_data.display(),
        vault_root = %paths.vault_root.display(),
        "vault context"
    );

    let scheduler = BackupScheduler::spawn(
        Arc::new(GitRunner::new(config.git_program.clone())),
        SettingsStore::new(&paths.app_data),
        SchedulerOptions {
            vault_root: paths.vault_root.clone(),
            debounce: config.debounce(),
            identity: Identity::default(),
        },
    );
    let store = VaultStore::new(&paths.vault_root, StoreOptions::from(&config));
    let vault = Vault::new(store, scheduler);

    Ok(VaultContext {
        vault,
        paths,
        config,
    })
}
