//! # Path Sanitizer
//!
//! Every path that reaches the file system comes from an untrusted place: a
//! note title typed by the user, an index file edited by hand, a file name
//! dropped onto the window. This module turns those strings into vault-relative
//! paths that are always safe to join onto the vault root.
//!
//! ## Rules
//!
//! - Both `/` and `\` separate segments; the output always uses `/`.
//! - Empty, `.` and `..` segments are dropped, so `../../etc/passwd` can never
//!   climb out of the vault (it becomes `etc/passwd.md`).
//! - Per segment: control characters and `<>:"|?*` are removed, whitespace runs
//!   collapse to one space, and leading dots are stripped. The directory scan
//!   skips hidden entries, so a note must never land in one.
//! - The last segment always ends in `.md`.
//!
//! Nothing here fails: input that sanitizes to nothing degrades to
//! `untitled.md` (notes) or `attachment` (attachment stems).

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

pub const NOTE_EXTENSION: &str = ".md";
const RESERVED: &[char] = &['<', '>', ':', '"', '|', '?', '*'];
const DEFAULT_NOTE_NAME: &str = "untitled.md";
const DEFAULT_ATTACHMENT_STEM: &str = "attachment";

/// Removes control and reserved characters and collapses whitespace.
fn clean_chars(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .filter(|c| !c.is_control() && !RESERVED.contains(c))
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns the name without its `.md` suffix (matched case-insensitively).
pub fn strip_note_extension(name: &str) -> Option<&str> {
    let cut = name.len().checked_sub(NOTE_EXTENSION.len())?;
    if name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(NOTE_EXTENSION) {
        Some(&name[..cut])
    } else {
        None
    }
}

fn unhide(segment: &str) -> String {
    segment.trim_start_matches('.').trim().to_string()
}

/// Normalizes an arbitrary string into a vault-relative `.md` path.
///
/// ```
/// use notevault::paths::sanitize_note_path;
///
/// assert_eq!(sanitize_note_path("Inbox/Hello"), "Inbox/Hello.md");
/// assert_eq!(sanitize_note_path("../../etc/passwd"), "etc/passwd.md");
/// assert_eq!(sanitize_note_path("  "), "untitled.md");
/// ```
pub fn sanitize_note_path(raw: &str) -> String {
    let mut segments: Vec<String> = raw
        .split(['/', '\\'])
        .map(clean_chars)
        .filter(|s| !s.is_empty() && s != "." && s != "..")
        .collect();

    let Some(last) = segments.pop() else {
        return DEFAULT_NOTE_NAME.to_string();
    };
    let mut out: Vec<String> = segments
        .iter()
        .map(|s| unhide(s))
        .filter(|s| !s.is_empty())
        .collect();

    let stem = strip_note_extension(&last).unwrap_or(&last);
    let stem = unhide(stem);
    if stem.is_empty() {
        out.push(DEFAULT_NOTE_NAME.to_string());
    } else {
        out.push(format!("{}{}", stem, NOTE_EXTENSION));
    }
    out.join("/")
}

/// Normalizes an uploaded file name into a flat, safe attachment name.
///
/// Directory parts are discarded, the stem is cleaned like a path segment and
/// the extension is reduced to lowercase ASCII alphanumerics.
pub fn sanitize_attachment_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();

    // A dot at position 0 belongs to the stem (".env" has no extension).
    let (stem_raw, ext_raw) = match base.rfind('.') {
        Some(idx) if idx > 0 => (&base[..idx], &base[idx + 1..]),
        _ => (base, ""),
    };

    let mut stem = unhide(&clean_chars(stem_raw));
    if stem.is_empty() {
        stem = DEFAULT_ATTACHMENT_STEM.to_string();
    }
    let ext: String = ext_raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();

    if ext.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, ext)
    }
}

/// Case-insensitive comparison key for vault paths.
pub fn path_key(path: &str) -> String {
    path.to_lowercase()
}

/// Splits the extension off the final segment: `"A/b.md"` → `("A/b", ".md")`.
pub fn split_extension(path: &str) -> (&str, &str) {
    let name_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[name_start..].rfind('.') {
        Some(idx) if idx > 0 => path.split_at(name_start + idx),
        _ => (path, ""),
    }
}

/// The `n`-th candidate name for a path: `n <= 1` is the path itself,
/// otherwise ` n` is inserted before the extension.
pub fn numbered(path: &str, n: usize) -> String {
    if n <= 1 {
        return path.to_string();
    }
    let (stem, ext) = split_extension(path);
    format!("{} {}{}", stem, n, ext)
}

/// Returns the first numbered variant of `candidate` whose key is not taken.
pub fn unique_path(candidate: &str, taken: &HashSet<String>) -> String {
    (1..)
        .map(|n| numbered(candidate, n))
        .find(|p| !taken.contains(&path_key(p)))
        .unwrap_or_else(|| candidate.to_string())
}

/// Directory part of a vault-relative path (`""` at the root).
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// The notebook a path belongs to: its first segment, or `default` for
/// notes sitting at the vault root.
pub fn notebook_for(path: &str, default: &str) -> String {
    match path.split_once('/') {
        Some((first, _)) if !first.trim().is_empty() => first.to_string(),
        _ => default.to_string(),
    }
}

/// Joins a sanitized, `/`-separated relative path onto a root directory.
pub fn join_rel(root: &Path, rel: &str) -> PathBuf {
    rel.split('/')
        .filter(|s| !s.is_empty())
        .fold(root.to_path_buf(), |acc, seg| acc.join(seg))
}

/// Converts an absolute path under `root` back to a `/`-separated relative path.
pub fn rel_string(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traversal_segments_are_dropped() {
        assert_eq!(sanitize_note_path("../../etc/passwd"), "etc/passwd.md");
        assert_eq!(sanitize_note_path("a/./b/../c"), "a/b/c.md");
        assert_eq!(sanitize_note_path("..\\..\\win\\note"), "win/note.md");
    }

    #[test]
    fn test_extension_is_enforced() {
        assert_eq!(sanitize_note_path("Inbox/Hello"), "Inbox/Hello.md");
        assert_eq!(sanitize_note_path("Inbox/Hello.md"), "Inbox/Hello.md");
        assert_eq!(sanitize_note_path("Inbox/Hello.MD"), "Inbox/Hello.md");
        assert_eq!(sanitize_note_path("notes.txt"), "notes.txt.md");
    }

    #[test]
    fn test_reserved_and_control_characters() {
        assert_eq!(sanitize_note_path("a<b>c:d\"e|f?g*h"), "abcdefgh.md");
        assert_eq!(sanitize_note_path("tab\there\u{7}bell"), "tabherebell.md");
        assert_eq!(sanitize_note_path("  many    spaces  /x"), "many spaces/x.md");
    }

    #[test]
    fn test_degenerate_input_defaults() {
        assert_eq!(sanitize_note_path(""), "untitled.md");
        assert_eq!(sanitize_note_path("///"), "untitled.md");
        assert_eq!(sanitize_note_path("../.."), "untitled.md");
        assert_eq!(sanitize_note_path("Folder/.md"), "Folder/untitled.md");
        assert_eq!(sanitize_note_path("???"), "untitled.md");
    }

    #[test]
    fn test_hidden_segments_are_unhidden() {
        assert_eq!(sanitize_note_path(".git/config"), "git/config.md");
        assert_eq!(sanitize_note_path(".secret.md"), "secret.md");
    }

    #[test]
    fn test_attachment_name() {
        assert_eq!(sanitize_attachment_name("photo.PNG"), "photo.png");
        assert_eq!(sanitize_attachment_name("../../x/y/evil.sh"), "evil.sh");
        assert_eq!(sanitize_attachment_name("C:\\Users\\me\\a b.jpg"), "a b.jpg");
        assert_eq!(sanitize_attachment_name("???.gif"), "attachment.gif");
        assert_eq!(sanitize_attachment_name(""), "attachment");
        assert_eq!(sanitize_attachment_name(".env"), "env");
        assert_eq!(sanitize_attachment_name("archive.tar.g-z"), "archive.tar.gz");
    }

    #[test]
    fn test_unique_path_suffixes() {
        let mut taken = HashSet::new();
        let first = unique_path("Notes/Untitled.md", &taken);
        taken.insert(path_key(&first));
        let second = unique_path("Notes/untitled.md", &taken);
        taken.insert(path_key(&second));
        let third = unique_path("Notes/Untitled.md", &taken);

        assert_eq!(first, "Notes/Untitled.md");
        assert_eq!(second, "Notes/untitled 2.md");
        assert_eq!(third, "Notes/Untitled 3.md");
    }

    #[test]
    fn test_split_extension_ignores_dotted_dirs() {
        assert_eq!(split_extension("a.b/c"), ("a.b/c", ""));
        assert_eq!(split_extension("a.b/c.md"), ("a.b/c", ".md"));
        assert_eq!(numbered("x.png", 3), "x 3.png");
    }

    #[test]
    fn test_notebook_for() {
        assert_eq!(notebook_for("Work/Plans/q1.md", "Notes"), "Work");
        assert_eq!(notebook_for("loose.md", "Notes"), "Notes");
    }

    #[test]
    fn test_join_and_rel_roundtrip() {
        let root = Path::new("/vault");
        let joined = join_rel(root, "A/B/c.md");
        assert_eq!(joined, Path::new("/vault/A/B/c.md"));
        assert_eq!(rel_string(root, &joined).as_deref(), Some("A/B/c.md"));
        assert_eq!(rel_string(root, root), None);
    }
}
