//! # Notevault Architecture
//!
//! Notevault is the storage engine of a Markdown note-taking app. It knows
//! nothing about windows, editors or IPC: a UI hands it the full list of notes
//! and asks for them back on start-up; everything in between is files.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Client (notevault-cli, or a desktop UI)                    │
//! │  - Parses input, renders output                             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Vault facade: sentinels and reports, never errors        │
//! │  - Triggers backups after every mutation                    │
//! └─────────────────────────────────────────────────────────────┘
//!               │                               │
//!               ▼                               ▼
//! ┌───────────────────────────────┐ ┌───────────────────────────┐
//! │  Store (store/) and           │ │  Backup (backup/)         │
//! │  Attachments (attachments.rs) │ │  - debounced actor        │
//! │  - files + sidecar index      │ │  - one git pass at a time │
//! └───────────────────────────────┘ └───────────────────────────┘
//! ```
//!
//! ## On-Disk Layout
//!
//! ```text
//! <app-data>/
//!   notevault.toml              optional configuration
//!   .vault-git-backup.json      backup on/off toggle
//!   vault/                      the vault root
//!     .git/                     backup history
//!     .vault-index.json         metadata cache
//!     Inbox/
//!       Hello.md
//!       attachments/photo.png
//! ```
//!
//! ## Key Principle: Files Are Truth
//!
//! The index exists so a UI can list thousands of notes without opening them.
//! It is never required: a vault with a missing, stale or corrupt index loads
//! correctly from the Markdown files alone. See [`store`].
//!
//! ## Module Overview
//!
//! - [`api`]: The [`Vault`](api::Vault) facade
//! - [`store`]: Load and save, index reconciliation
//! - [`attachments`]: Attachment upload and clone-on-copy
//! - [`backup`]: Git backup pass and scheduler
//! - [`model`]: Note types and metadata derivation
//! - [`paths`]: Path sanitizing and unique names
//! - [`report`]: Diagnostics returned by load and save
//! - [`config`], [`init`]: Configuration and context setup
//! - [`error`]: Error types

pub mod api;
pub mod attachments;
pub mod backup;
pub mod config;
pub mod error;
pub mod init;
pub mod model;
pub mod paths;
pub mod report;
pub mod store;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
