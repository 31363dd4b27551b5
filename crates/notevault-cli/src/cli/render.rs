//! # Rendering
//!
//! Plain string builders for terminal output. Width math is Unicode-aware
//! (`unicode-width`) so titles with wide characters still line up; colors come
//! from `console`, which turns them off when stdout is not a terminal.

use chrono::{DateTime, Utc};
use console::style;
use notevault::attachments::StoredAttachment;
use notevault::backup::BackupState;
use notevault::model::NoteRecord;
use notevault::report::{Diagnostic, LoadReport, LoadSource, MessageLevel, SaveReport};
use std::fmt::Write;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub const TITLE_WIDTH: usize = 40;
pub const NOTEBOOK_WIDTH: usize = 16;

pub fn note_list(notes: &[NoteRecord]) -> String {
    if notes.is_empty() {
        return format!("{}\n", style("No notes.").dim());
    }

    let mut out = String::new();
    for note in notes {
        let title = truncate_to_width(&note.title, TITLE_WIDTH);
        let notebook = truncate_to_width(&note.notebook, NOTEBOOK_WIDTH);
        let _ = writeln!(
            out,
            "{}{}  {}{}  {}",
            style(&title).bold(),
            pad(&title, TITLE_WIDTH),
            style(&notebook).cyan(),
            pad(&notebook, NOTEBOOK_WIDTH),
            style(format_time_ago(note.updated_at)).dim(),
        );
        let _ = writeln!(out, "  {}", style(&note.path).dim());
    }
    out
}

pub fn save_summary(report: &SaveReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Saved {} note{} ({} written, {} unchanged)",
        report.entries.len(),
        plural(report.entries.len()),
        report.written,
        report.unchanged,
    );
    for (from, to) in &report.renamed {
        let _ = writeln!(out, "  {} {} -> {}", style("renamed").yellow(), from, to);
    }
    for path in &report.removed {
        let _ = writeln!(out, "  {} {}", style("removed").red(), path);
    }
    out.push_str(&diagnostics(&report.diagnostics));
    out
}

pub fn load_summary(report: &LoadReport) -> String {
    let source = match report.source {
        LoadSource::Index => "index",
        LoadSource::Scan => "directory scan",
        LoadSource::Empty => "nothing",
    };
    let count = report.notes.as_ref().map_or(0, Vec::len);
    let mut out = format!("Loaded {} note{} from {}", count, plural(count), source);
    if report.adopted > 0 {
        let _ = write!(out, ", adopted {} unindexed", report.adopted);
    }
    if report.stale_entries > 0 {
        let _ = write!(out, ", dropped {} stale", report.stale_entries);
    }
    out.push('\n');
    out.push_str(&diagnostics(&report.diagnostics));
    out
}

pub fn copied_attachments(count: usize) -> String {
    if count == 0 {
        return String::new();
    }
    format!("Copied {} attachment{}\n", count, plural(count))
}

pub fn stored_attachment(stored: &StoredAttachment) -> String {
    format!(
        "{}\n  {} ({} bytes)\n",
        stored.relative_path,
        style(&stored.stored_path).dim(),
        stored.size_bytes
    )
}

pub fn backup_state(state: &BackupState) -> String {
    let mut out = String::new();
    let enabled = if state.enabled {
        style("enabled").green()
    } else {
        style("disabled").yellow()
    };
    let git = match state.available {
        Some(true) => style("available").green(),
        Some(false) => style("not found").red(),
        None => style("not checked yet").dim(),
    };
    let _ = writeln!(out, "{:<12}{}", "Backups", enabled);
    let _ = writeln!(out, "{:<12}{}", "Git", git);

    let activity = if state.busy {
        "running"
    } else if state.pending {
        "scheduled"
    } else if state.dirty {
        "changes not backed up"
    } else {
        "idle"
    };
    let _ = writeln!(out, "{:<12}{}", "Status", activity);

    if let Some(at) = state.last_commit_at {
        let hash = state.last_commit_hash.as_deref().unwrap_or("-");
        let _ = writeln!(
            out,
            "{:<12}{} {}",
            "Last commit",
            style(hash).yellow(),
            style(format_time_ago(at)).dim()
        );
    }
    if let Some(reason) = &state.last_reason {
        let _ = writeln!(out, "{:<12}{}", "Reason", reason);
    }
    if let Some(error) = &state.last_error {
        let _ = writeln!(out, "{:<12}{}", "Error", style(error).red());
    }
    out
}

pub fn diagnostics(items: &[Diagnostic]) -> String {
    let mut out = String::new();
    for item in items {
        let label = match item.level {
            MessageLevel::Info => style("info").dim(),
            MessageLevel::Warning => style("warning").yellow(),
            MessageLevel::Error => style("error").red(),
        };
        match &item.path {
            Some(path) => {
                let _ = writeln!(out, "  {}: {} ({})", label, item.message, path);
            }
            None => {
                let _ = writeln!(out, "  {}: {}", label, item.message);
            }
        }
    }
    out
}

pub fn warning(message: &str) -> String {
    format!("{}: {}", style("warning").yellow(), message)
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn pad(text: &str, width: usize) -> String {
    " ".repeat(width.saturating_sub(text.width()))
}

/// Cuts `text` to at most `width` columns, ending in `…` when shortened.
fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let budget = width.saturating_sub(1);
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}

fn format_time_ago(timestamp: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(timestamp);
    timeago::Formatter::new().convert(duration.to_std().unwrap_or_default())
}
