//! Structured results for vault operations.
//!
//! The public facade never returns errors, so anything worth telling the caller
//! (a rejected index entry, a file that could not be deleted, a renamed note)
//! travels back as a [`Diagnostic`] inside one of these reports. A UI can ignore
//! them entirely or surface the warnings.

use crate::model::{IndexEntry, NoteRecord};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub level: MessageLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Diagnostic {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(MessageLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(MessageLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(MessageLevel::Error, message)
    }

    fn new(level: MessageLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            path: None,
        }
    }

    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Where a load found its notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSource {
    /// The index produced at least one note (un-indexed files were adopted).
    Index,
    /// The index was empty or useless; notes came from a directory scan.
    Scan,
    /// Nothing usable was found.
    Empty,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub notes: Option<Vec<NoteRecord>>,
    pub source: LoadSource,
    pub adopted: usize,
    pub stale_entries: usize,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    /// True once the new index has been written.
    pub committed: bool,
    pub written: usize,
    pub unchanged: usize,
    pub skipped: usize,
    /// `(requested, assigned)` pairs for notes that needed a numeric suffix.
    pub renamed: Vec<(String, String)>,
    pub removed: Vec<String>,
    pub entries: Vec<IndexEntry>,
    pub diagnostics: Vec<Diagnostic>,
}

impl SaveReport {
    pub fn has_warnings(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.level != MessageLevel::Info)
    }
}
