//! # Domain Model: Notes, Index Entries and Derived Metadata
//!
//! A note lives in two places at once:
//!
//! - **Body**: the Markdown file at `<vault>/<path>`. This is the source of truth
//!   for *content* and for *existence*.
//! - **Metadata**: an [`IndexEntry`] in `.vault-index.json`. This is a cache of
//!   everything the UI lists without opening files (title, snippet, tags, ...).
//!
//! Either side can drift. The index may carry metadata the body no longer
//! supports, or none at all for a file that was dropped into the folder by hand.
//! The rule used everywhere is the same: **explicit, non-empty metadata wins;
//! anything missing is derived from the body.** [`NoteRecord::build`] is the
//! single place that applies it.
//!
//! ## Derivation
//!
//! [`derive_metadata`] reads a Markdown body and produces:
//!
//! - **title**: the first `# ` heading, or `Untitled`.
//! - **snippet**: the first N characters of plain text once front-matter, the
//!   title heading and Markdown punctuation are stripped.
//! - **tags**: every `#word` token, lowercased, first-seen order.
//! - **links**: every `[[Target]]` token (alias and heading parts dropped).
//!
//! Code spans and fenced blocks are ignored for tags and links, so `#include`
//! in a C snippet does not become a tag.
//!
//! ## Tolerant Timestamps
//!
//! Index files written by older builds store timestamps as epoch milliseconds;
//! current builds write RFC 3339 strings. Both are accepted on read, and an
//! unparseable value is treated as absent rather than rejecting the entry.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

pub const DEFAULT_TITLE: &str = "Untitled";
pub const DEFAULT_SNIPPET_LENGTH: usize = 160;

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#[ \t]+(.+?)[ \t#]*$").expect("valid title regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\w&/#])#(\p{L}[\p{L}\p{N}_/-]*)").expect("valid tag regex")
});
static WIKI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\[\]]+)\]\]").expect("valid wiki link regex"));
static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?ms)^[ \t]*(```|~~~).*?^[ \t]*(```|~~~)[ \t]*$").expect("valid fence regex"));
static INLINE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`[^`\n]*`").expect("valid inline code regex"));
static IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("valid image regex"));
static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid link regex"));
static BLOCK_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:#{1,6}[ \t]+|>[ \t]?|[-*+][ \t]+(?:\[[ xX]\][ \t]+)?|\d+\.[ \t]+)")
        .expect("valid block marker regex")
});
static RULE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:-{3,}|\*{3,}|_{3,})[ \t]*$").expect("valid rule regex"));
static EMPHASIS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*_`~]+").expect("valid emphasis regex"));

/// A note as the UI sees it: metadata plus the Markdown body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub id: String,
    pub path: String,
    pub title: String,
    pub snippet: String,
    pub tags: Vec<String>,
    pub links_out: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub notebook: String,
    pub is_template: bool,
    pub markdown: String,
}

/// The index-file projection of a [`NoteRecord`] (everything but the body).
///
/// Deserialization goes through a permissive helper and then validates: the
/// only hard requirement is a non-empty `path`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub id: String,
    pub path: String,
    pub title: String,
    pub snippet: String,
    pub tags: Vec<String>,
    pub links_out: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub notebook: String,
    pub is_template: bool,
}

impl<'de> Deserialize<'de> for IndexEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let helper = IndexEntryHelper::deserialize(deserializer)?;
        let path = helper
            .path
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| serde::de::Error::custom("index entry has no path"))?;

        Ok(IndexEntry {
            id: helper.id.unwrap_or_default(),
            path,
            title: helper.title.unwrap_or_default(),
            snippet: helper.snippet.unwrap_or_default(),
            tags: helper.tags.unwrap_or_default(),
            links_out: helper.links_out.unwrap_or_default(),
            created_at: helper.created_at,
            updated_at: helper.updated_at,
            notebook: helper.notebook.unwrap_or_default(),
            is_template: helper.is_template.unwrap_or(false),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexEntryHelper {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    links_out: Option<Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    notebook: Option<String>,
    #[serde(default)]
    is_template: Option<bool>,
}

/// One item of a save payload.
///
/// Only the body is required. Everything else is optional and, when absent or
/// empty, is carried over from the previous index or derived from the body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub links_out: Option<Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notebook: Option<String>,
    #[serde(default)]
    pub is_template: Option<bool>,
    #[serde(alias = "content")]
    pub markdown: String,
}

impl NoteInput {
    pub fn new(path: impl Into<String>, markdown: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            markdown: markdown.into(),
            ..Default::default()
        }
    }

    /// The raw path to sanitize: explicit path, else the title, else `Untitled`.
    pub fn raw_path(&self) -> &str {
        non_empty(self.path.as_deref())
            .or_else(|| non_empty(self.title.as_deref()))
            .unwrap_or(DEFAULT_TITLE)
    }
}

impl From<&NoteRecord> for NoteInput {
    fn from(note: &NoteRecord) -> Self {
        Self {
            id: Some(note.id.clone()),
            path: Some(note.path.clone()),
            title: Some(note.title.clone()),
            snippet: Some(note.snippet.clone()),
            tags: Some(note.tags.clone()),
            links_out: Some(note.links_out.clone()),
            created_at: Some(note.created_at),
            updated_at: Some(note.updated_at),
            notebook: Some(note.notebook.clone()),
            is_template: Some(note.is_template),
            markdown: note.markdown.clone(),
        }
    }
}

/// Metadata offered by a caller or an index entry. Empty strings and empty
/// lists count as absent.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub id: Option<String>,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub tags: Option<Vec<String>>,
    pub links_out: Option<Vec<String>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub notebook: Option<String>,
    pub is_template: bool,
}

impl From<&IndexEntry> for Overrides {
    fn from(entry: &IndexEntry) -> Self {
        Self {
            id: Some(entry.id.clone()),
            title: Some(entry.title.clone()),
            snippet: Some(entry.snippet.clone()),
            tags: Some(entry.tags.clone()),
            links_out: Some(entry.links_out.clone()),
            created_at: entry.created_at,
            updated_at: entry.updated_at,
            notebook: Some(entry.notebook.clone()),
            is_template: entry.is_template,
        }
    }
}

impl From<&NoteInput> for Overrides {
    fn from(input: &NoteInput) -> Self {
        Self {
            id: input.id.clone(),
            title: input.title.clone(),
            snippet: input.snippet.clone(),
            tags: input.tags.clone(),
            links_out: input.links_out.clone(),
            created_at: input.created_at,
            updated_at: input.updated_at,
            notebook: input.notebook.clone(),
            is_template: input.is_template.unwrap_or(false),
        }
    }
}

/// Values used when neither overrides nor the body provide a field.
#[derive(Debug, Clone)]
pub struct RecordDefaults<'a> {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub notebook: &'a str,
    pub snippet_length: usize,
}

impl NoteRecord {
    /// Builds a record for `path`, preferring non-empty overrides and deriving
    /// the rest from `markdown`.
    pub fn build(
        path: String,
        markdown: String,
        overrides: Overrides,
        defaults: &RecordDefaults<'_>,
    ) -> Self {
        let derived = derive_metadata(&markdown, defaults.snippet_length);
        let notebook = non_empty(overrides.notebook.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| crate::paths::notebook_for(&path, defaults.notebook));

        NoteRecord {
            id: non_empty(overrides.id.as_deref())
                .map(str::to_string)
                .unwrap_or_else(new_note_id),
            title: non_empty(overrides.title.as_deref())
                .map(str::to_string)
                .unwrap_or(derived.title),
            snippet: non_empty(overrides.snippet.as_deref())
                .map(str::to_string)
                .unwrap_or(derived.snippet),
            tags: overrides
                .tags
                .filter(|t| !t.is_empty())
                .map(|t| normalize_tags(t.iter().map(String::as_str)))
                .unwrap_or(derived.tags),
            links_out: overrides
                .links_out
                .filter(|l| !l.is_empty())
                .unwrap_or(derived.links_out),
            created_at: overrides.created_at.unwrap_or(defaults.created_at),
            updated_at: overrides.updated_at.unwrap_or(defaults.updated_at),
            notebook,
            is_template: overrides.is_template,
            path,
            markdown,
        }
    }

    pub fn index_entry(&self) -> IndexEntry {
        IndexEntry {
            id: self.id.clone(),
            path: self.path.clone(),
            title: self.title.clone(),
            snippet: self.snippet.clone(),
            tags: self.tags.clone(),
            links_out: self.links_out.clone(),
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
            notebook: self.notebook.clone(),
            is_template: self.is_template,
        }
    }
}

pub fn new_note_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Metadata derived purely from a Markdown body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedMeta {
    pub title: String,
    pub snippet: String,
    pub tags: Vec<String>,
    pub links_out: Vec<String>,
}

pub fn derive_metadata(markdown: &str, snippet_length: usize) -> DerivedMeta {
    let body = strip_front_matter(markdown);
    let title_match = TITLE_RE.captures(body).and_then(|c| c.get(1));
    let title = title_match
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let without_title = match TITLE_RE.find(body) {
        Some(m) => format!("{}{}", &body[..m.start()], &body[m.end()..]),
        None => body.to_string(),
    };
    let code_free = strip_code(body);

    DerivedMeta {
        title,
        snippet: make_snippet(&without_title, snippet_length),
        tags: extract_tags(&code_free),
        links_out: extract_links(&code_free),
    }
}

/// Drops a leading `---` ... `---` YAML block, if any.
pub fn strip_front_matter(markdown: &str) -> &str {
    let text = markdown.strip_prefix('\u{feff}').unwrap_or(markdown);
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return text;
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        offset += line.len();
        if line.trim_end() == "---" {
            return &rest[offset..];
        }
    }
    text
}

fn strip_code(text: &str) -> String {
    let no_fences = FENCE_RE.replace_all(text, "");
    INLINE_CODE_RE.replace_all(&no_fences, "").into_owned()
}

fn make_snippet(body: &str, max_chars: usize) -> String {
    let text = IMAGE_RE.replace_all(body, "$1");
    let text = LINK_RE.replace_all(&text, "$1");
    let text = WIKI_RE.replace_all(&text, |caps: &regex::Captures| {
        wiki_target(&caps[1]).unwrap_or_default()
    });
    let text = RULE_RE.replace_all(&text, " ");
    let text = BLOCK_MARKER_RE.replace_all(&text, "");
    let text = EMPHASIS_RE.replace_all(&text, "");

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(max_chars).collect::<String>().trim_end().to_string()
}

fn extract_tags(text: &str) -> Vec<String> {
    normalize_tags(TAG_RE.captures_iter(text).filter_map(|c| c.get(1)).map(|m| m.as_str()))
}

/// Lowercases, trims trailing separators and deduplicates, keeping first-seen order.
pub fn normalize_tags<'a>(tags: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().trim_start_matches('#').trim_end_matches(['-', '/']).to_lowercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

fn extract_links(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    WIKI_RE
        .captures_iter(text)
        .filter_map(|c| wiki_target(&c[1]))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// `Target#Heading|Alias` → `Target`.
fn wiki_target(inner: &str) -> Option<String> {
    let target = inner.split(['|', '#']).next().unwrap_or_default().trim();
    if target.is_empty() {
        None
    } else {
        Some(target.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Millis(f64),
}

impl RawTimestamp {
    fn into_utc(self) -> Option<DateTime<Utc>> {
        match self {
            RawTimestamp::Text(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            RawTimestamp::Millis(ms) if ms.is_finite() => {
                DateTime::from_timestamp_millis(ms as i64)
            }
            RawTimestamp::Millis(_) => None,
        }
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawTimestamp>::deserialize(deserializer)?;
    Ok(raw.and_then(RawTimestamp::into_utc))
}
