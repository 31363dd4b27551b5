//! # Attachments
//!
//! Binary files referenced from notes live in an `attachments/` directory next
//! to the note that uses them, so a note's folder can be moved or shared as a
//! unit. Links are always written relative (`./attachments/photo.png`).
//!
//! Two operations:
//!
//! - [`AttachmentManager::store`] decodes a base64 upload (optionally a
//!   `data:` URL) into the note's attachments directory.
//! - [`AttachmentManager::clone_links`] is used when a note is duplicated:
//!   every local link in the Markdown is copied into the new note's
//!   attachments directory and rewritten, so the two notes never share files.
//!
//! A file is never overwritten. Names are claimed with `create_new`, and a
//! taken name gets a numeric suffix (`photo 2.png`).

use crate::error::{Result, VaultError};
use crate::paths::{
    join_rel, numbered, parent_dir, sanitize_attachment_name, sanitize_note_path,
    strip_note_extension,
};
use crate::report::Diagnostic;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const ATTACHMENTS_DIR: &str = "attachments";

/// Characters that would break a Markdown link destination.
const LINK_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'(')
    .add(b')')
    .add(b'<')
    .add(b'>')
    .add(b'?');

static MD_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(!?\[[^\]\n]*\])\(\s*(<[^>\n]*>|[^)\s]+)((?:\s+"[^"\n]*")?)\s*\)"#)
        .expect("valid markdown link regex")
});
static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").expect("valid scheme regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAttachment {
    /// Link target to paste into the note, e.g. `./attachments/photo.png`.
    pub relative_path: String,
    /// Vault-relative location of the file.
    pub stored_path: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneOutcome {
    pub markdown: String,
    pub copied_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl CloneOutcome {
    pub fn unchanged(markdown: &str) -> Self {
        Self {
            markdown: markdown.to_string(),
            copied_count: 0,
            diagnostics: Vec::new(),
        }
    }
}

pub struct AttachmentManager {
    root: PathBuf,
}

impl AttachmentManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Decodes `data` and writes it next to `note_path`.
    pub fn store(&self, note_path: &str, file_name: &str, data: &str) -> Result<StoredAttachment> {
        let bytes = decode_payload(data)?;
        let dir_rel = attachments_dir_for(note_path);
        let dir = join_rel(&self.root, &dir_rel);
        fs::create_dir_all(&dir).map_err(VaultError::io_at(&dir))?;

        let (name, file) = claim_name(&dir, &sanitize_attachment_name(file_name))?;
        fill_claimed(&dir.join(&name), file, |f| f.write_all(&bytes))?;
        debug!(note = note_path, name = %name, bytes = bytes.len(), "attachment stored");

        Ok(StoredAttachment {
            relative_path: link_target(&name),
            stored_path: format!("{}/{}", dir_rel, name),
            size_bytes: bytes.len() as u64,
        })
    }

    /// Copies every local attachment `markdown` links to into the attachments
    /// directory of `target_note_path` and rewrites the links to match.
    ///
    /// Links that are external, anchors, absolute, other notes, outside the
    /// vault, or simply missing are left untouched.
    pub fn clone_links(
        &self,
        source_note_path: &str,
        target_note_path: &str,
        markdown: &str,
    ) -> Result<CloneOutcome> {
        let source_dir = parent_dir(&sanitize_note_path(source_note_path)).to_string();
        let target_dir_rel = attachments_dir_for(target_note_path);
        let target_dir = join_rel(&self.root, &target_dir_rel);

        let mut copies: HashMap<PathBuf, String> = HashMap::new();
        let mut diagnostics = Vec::new();
        let mut out = String::with_capacity(markdown.len());
        let mut last = 0;

        for caps in MD_LINK_RE.captures_iter(markdown) {
            let (Some(whole), Some(label), Some(target)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            let Some(source) = self.resolve_local(&source_dir, target.as_str()) else {
                continue;
            };

            let new_target = match copies.get(&source) {
                Some(existing) => existing.clone(),
                None => {
                    if let Err(e) = fs::create_dir_all(&target_dir) {
                        warn!(dir = %target_dir.display(), error = %e, "cannot create attachments folder");
                        diagnostics.push(
                            Diagnostic::warning(format!("cannot create attachments folder: {}", e))
                                .at(target.as_str()),
                        );
                        continue;
                    }
                    match copy_into(&source, &target_dir) {
                        Ok(name) => {
                            let link = link_target(&name);
                            copies.insert(source.clone(), link.clone());
                            link
                        }
                        Err(e) => {
                            warn!(source = %source.display(), error = %e, "cannot copy attachment");
                            diagnostics.push(
                                Diagnostic::warning(format!("cannot copy attachment: {}", e))
                                    .at(target.as_str()),
                            );
                            continue;
                        }
                    }
                }
            };

            let title = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
            out.push_str(&markdown[last..whole.start()]);
            out.push_str(&format!("{}({}{})", label.as_str(), new_target, title));
            last = whole.end();
        }
        out.push_str(&markdown[last..]);

        Ok(CloneOutcome {
            markdown: out,
            copied_count: copies.len(),
            diagnostics,
        })
    }

    /// Resolves a link destination, relative to the directory of the linking
    /// note, to an existing file inside the vault.
    fn resolve_local(&self, note_dir: &str, raw_target: &str) -> Option<PathBuf> {
        let target = raw_target.trim();
        let target = target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .unwrap_or(target)
            .trim();

        if target.is_empty()
            || target.starts_with('#')
            || target.starts_with('/')
            || target.starts_with('\\')
            || SCHEME_RE.is_match(target)
        {
            return None;
        }

        let target = target.split(['#', '?']).next().unwrap_or_default();
        let decoded = percent_decode_str(target).decode_utf8_lossy();

        let mut segments: Vec<&str> = note_dir.split('/').filter(|s| !s.is_empty()).collect();
        for segment in decoded.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    // Climbing above the vault root.
                    segments.pop()?;
                }
                other => segments.push(other),
            }
        }

        let name = segments.last()?;
        if strip_note_extension(name).is_some() {
            return None;
        }

        let full = join_rel(&self.root, &segments.join("/"));
        full.is_file().then_some(full)
    }
}

/// `Inbox/Hello.md` → `Inbox/attachments`; root notes use `attachments`.
fn attachments_dir_for(note_path: &str) -> String {
    let note = sanitize_note_path(note_path);
    match parent_dir(&note) {
        "" => ATTACHMENTS_DIR.to_string(),
        dir => format!("{}/{}", dir, ATTACHMENTS_DIR),
    }
}

fn link_target(name: &str) -> String {
    format!(
        "./{}/{}",
        ATTACHMENTS_DIR,
        utf8_percent_encode(name, LINK_ENCODE)
    )
}

/// Accepts raw base64 or a `data:<mime>;base64,<payload>` URL. Whitespace
/// inside the payload is ignored.
fn decode_payload(data: &str) -> Result<Vec<u8>> {
    let trimmed = data.trim();
    let payload = if trimmed.starts_with("data:") {
        let (header, payload) = trimmed
            .split_once(',')
            .ok_or_else(|| VaultError::InvalidPayload("data URL has no payload".to_string()))?;
        if !header.ends_with(";base64") {
            return Err(VaultError::InvalidPayload(
                "data URL is not base64 encoded".to_string(),
            ));
        }
        payload
    } else {
        trimmed
    };

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(STANDARD.decode(compact)?)
}

/// Creates the first free variant of `name` in `dir`.
fn claim_name(dir: &Path, name: &str) -> Result<(String, File)> {
    for n in 1.. {
        let candidate = numbered(name, n);
        let path = dir.join(&candidate);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(VaultError::io_at(&path)(e)),
        }
    }
    Err(VaultError::Store(format!("no free name for {}", name)))
}

fn copy_into(source: &Path, dir: &Path) -> Result<String> {
    let raw_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut src = File::open(source).map_err(VaultError::io_at(source))?;
    let (name, dest) = claim_name(dir, &sanitize_attachment_name(&raw_name))?;
    fill_claimed(&dir.join(&name), dest, |f| io::copy(&mut src, f).map(|_| ()))?;
    Ok(name)
}

/// Writes into a file just claimed by [`claim_name`]. A failed write removes
/// the file so no empty or partial attachment is left behind.
fn fill_claimed(
    path: &Path,
    mut file: File,
    write: impl FnOnce(&mut File) -> io::Result<()>,
) -> Result<()> {
    if let Err(e) = write(&mut file) {
        drop(file);
        if let Err(cleanup) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %cleanup, "cannot remove partial attachment");
        }
        return Err(VaultError::io_at(path)(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_B64: &str = "iVBORw0KGgo=";

    #[test]
    fn test_store_writes_next_to_note() {
        let dir = TempDir::new().unwrap();
        let manager = AttachmentManager::new(dir.path());

        let stored = manager.store("Inbox/Hello", "Photo.PNG", PNG_B64).unwrap();
        assert_eq!(stored.relative_path, "./attachments/Photo.png");
        assert_eq!(stored.stored_path, "Inbox/attachments/Photo.png");
        assert_eq!(stored.size_bytes, 8);
        assert!(dir.path().join("Inbox/attachments/Photo.png").is_file());
    }

    #[test]
    fn test_store_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let manager = AttachmentManager::new(dir.path());

        let first = manager.store("a", "x.png", PNG_B64).unwrap();
        let second = manager.store("a", "x.png", PNG_B64).unwrap();
        assert_eq!(first.stored_path, "attachments/x.png");
        assert_eq!(second.stored_path, "attachments/x 2.png");
        assert_eq!(second.relative_path, "./attachments/x%202.png");
    }

    #[test]
    fn test_store_accepts_data_url_and_whitespace() {
        let dir = TempDir::new().unwrap();
        let manager = AttachmentManager::new(dir.path());

        let stored = manager
            .store("a", "note.txt", "data:text/plain;base64,aGVs\nbG8=")
            .unwrap();
        let written = fs::read(dir.path().join(&stored.stored_path)).unwrap();
        assert_eq!(written, b"hello");
    }

    #[test]
    fn test_store_rejects_bad_payloads() {
        let dir = TempDir::new().unwrap();
        let manager = AttachmentManager::new(dir.path());

        assert!(manager.store("a", "x.bin", "not base64!!").is_err());
        assert!(manager.store("a", "x.txt", "data:text/plain,hello").is_err());
    }

    #[test]
    fn test_clone_links_copies_local_and_skips_the_rest() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Src/attachments")).unwrap();
        fs::write(root.join("Src/attachments/pic one.png"), b"png").unwrap();
        let manager = AttachmentManager::new(root);

        let md = "![a](./attachments/pic%20one.png \"Cap\") \
                  [again](attachments/pic%20one.png#frag) \
                  [web](https://example.com/x.png) [anchor](#top) \
                  [note](Other.md) [abs](/etc/passwd) [escape](../../outside.png) \
                  [missing](./attachments/nope.png)";
        let outcome = manager.clone_links("Src/Note", "Dst/Copy", md).unwrap();

        assert_eq!(outcome.copied_count, 1);
        assert!(root.join("Dst/attachments/pic one.png").is_file());
        assert!(outcome
            .markdown
            .starts_with("![a](./attachments/pic%20one.png \"Cap\") [again](./attachments/pic%20one.png)"));
        assert!(outcome.markdown.contains("[web](https://example.com/x.png)"));
        assert!(outcome.markdown.contains("[anchor](#top)"));
        assert!(outcome.markdown.contains("[note](Other.md)"));
        assert!(outcome.markdown.contains("[abs](/etc/passwd)"));
        assert!(outcome.markdown.contains("[escape](../../outside.png)"));
        assert!(outcome.markdown.contains("[missing](./attachments/nope.png)"));
    }

    #[test]
    fn test_clone_within_same_folder_makes_independent_copy() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("attachments")).unwrap();
        fs::write(root.join("attachments/a.png"), b"png").unwrap();
        let manager = AttachmentManager::new(root);

        let outcome = manager
            .clone_links("One", "Two", "![x](./attachments/a.png)")
            .unwrap();
        assert_eq!(outcome.markdown, "![x](./attachments/a%202.png)");
        assert!(root.join("attachments/a 2.png").is_file());
    }

    #[test]
    fn test_failed_write_removes_claimed_file() {
        let dir = TempDir::new().unwrap();
        let (name, file) = claim_name(dir.path(), "x.png").unwrap();
        let path = dir.path().join(&name);
        assert!(path.is_file());

        let result = fill_claimed(&path, file, |_| Err(io::Error::other("disk full")));
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_clone_reports_unusable_target_folder() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Src/attachments")).unwrap();
        fs::write(root.join("Src/attachments/a.png"), b"png").unwrap();
        fs::create_dir_all(root.join("Dst")).unwrap();
        // A plain file where the attachments folder should go.
        fs::write(root.join("Dst/attachments"), b"").unwrap();
        let manager = AttachmentManager::new(root);

        let md = "![x](./attachments/a.png)";
        let outcome = manager.clone_links("Src/Note", "Dst/Copy", md).unwrap();
        assert_eq!(outcome.copied_count, 0);
        assert_eq!(outcome.markdown, md);
        assert_eq!(outcome.diagnostics.len(), 1);
    }

    #[test]
    fn test_clone_without_links_is_unchanged() {
        let dir = TempDir::new().unwrap();
        let manager = AttachmentManager::new(dir.path());
        let outcome = manager.clone_links("a", "b", "plain [[wiki]] text").unwrap();
        assert_eq!(outcome, CloneOutcome::unchanged("plain [[wiki]] text"));
        assert!(!dir.path().join(ATTACHMENTS_DIR).exists());
    }
}
