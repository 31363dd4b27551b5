//! Directory traversal without recursion.
//!
//! Both the Markdown scan and the empty-directory pruning use explicit loops so
//! a deeply nested vault cannot exhaust the stack.

use crate::attachments::ATTACHMENTS_DIR;
use crate::error::{Result, VaultError};
use crate::paths::strip_note_extension;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Every `*.md` file under `root`, sorted. Hidden files and directories are
/// skipped, as are `attachments/` folders (an uploaded `.md` file is not a
/// note). Symlinked directories are not followed.
pub fn markdown_files(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_hidden(&name) {
                continue;
            }
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                if !name.eq_ignore_ascii_case(ATTACHMENTS_DIR) {
                    stack.push(entry.path());
                }
            } else if strip_note_extension(&name).is_some_and(|stem| !stem.is_empty()) {
                found.push(entry.path());
            }
        }
    }

    found.sort();
    found
}

/// Removes `start` and its ancestors while they are empty, stopping at the
/// first non-empty directory. `root` itself is never removed, nor is anything
/// outside it.
pub fn prune_empty_dirs(root: &Path, start: &Path) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    let mut current = start.to_path_buf();

    while current != root && current.starts_with(root) {
        let mut entries = match fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                }
                continue;
            }
            Err(e) => return Err(VaultError::io_at(&current)(e)),
        };
        if entries.next().is_some() {
            break;
        }
        fs::remove_dir(&current).map_err(VaultError::io_at(&current))?;
        removed.push(current.clone());

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_finds_nested_markdown_and_skips_hidden() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("A/B/C")).unwrap();
        fs::create_dir_all(root.join(".git/objects")).unwrap();
        fs::write(root.join("top.md"), "x").unwrap();
        fs::write(root.join("A/B/C/deep.MD"), "x").unwrap();
        fs::write(root.join("A/readme.txt"), "x").unwrap();
        fs::write(root.join(".git/objects/fake.md"), "x").unwrap();
        fs::write(root.join(".hidden.md"), "x").unwrap();

        let found = markdown_files(root);
        assert_eq!(found, vec![root.join("A/B/C/deep.MD"), root.join("top.md")]);
    }

    #[test]
    fn test_scan_skips_attachment_folders() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Inbox/attachments")).unwrap();
        fs::create_dir_all(root.join("attachments")).unwrap();
        fs::write(root.join("Inbox/Hello.md"), "x").unwrap();
        fs::write(root.join("Inbox/attachments/readme.md"), "x").unwrap();
        fs::write(root.join("attachments/notes.md"), "x").unwrap();

        assert_eq!(markdown_files(root), vec![root.join("Inbox/Hello.md")]);
    }

    #[test]
    fn test_scan_handles_deep_nesting() {
        let dir = TempDir::new().unwrap();
        let mut deep = dir.path().to_path_buf();
        for i in 0..64 {
            deep = deep.join(format!("d{}", i));
        }
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("bottom.md"), "x").unwrap();

        assert_eq!(markdown_files(dir.path()).len(), 1);
    }

    #[test]
    fn test_prune_removes_empty_chain_but_not_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("A/B")).unwrap();

        let removed = prune_empty_dirs(root, &root.join("A/B")).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!root.join("A").exists());
        assert!(root.exists());
    }

    #[test]
    fn test_prune_stops_at_non_empty_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("A/B")).unwrap();
        fs::write(root.join("A/keep.md"), "x").unwrap();

        let removed = prune_empty_dirs(root, &root.join("A/B")).unwrap();
        assert_eq!(removed, vec![root.join("A/B")]);
        assert!(root.join("A/keep.md").exists());
    }

    #[test]
    fn test_prune_ignores_paths_outside_root() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let removed = prune_empty_dirs(dir.path(), outside.path()).unwrap();
        assert!(removed.is_empty());
        assert!(outside.path().exists());
    }
}
