//! Dispatch and command handlers.
//!
//! Handlers return whether they changed the vault; `run` uses that to decide
//! whether a backup has to be settled before the process exits.

use super::render;
use super::setup::{BackupAction, Cli, Commands};
use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::Parser;
use notevault::api::Vault;
use notevault::backup::BackupState;
use notevault::init::initialize;
use notevault::model::{NoteInput, NoteRecord};
use notevault::paths::{path_key, sanitize_note_path};
use notevault::report::SaveReport;
use serde::Serialize;
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ctx = initialize(cli.data.clone())?;
    let vault = &ctx.vault;
    debug!(vault_root = %ctx.paths.vault_root.display(), "vault ready");

    let out = Output { json: cli.json };
    let command = cli.command.unwrap_or(Commands::List { notebook: None });
    let mutated = match command {
        Commands::List { notebook } => cmd_list(vault, notebook.as_deref(), &out)?,
        Commands::Show { path } => cmd_show(vault, &path, &out)?,
        Commands::Write { path, file } => cmd_write(vault, &path, file.as_deref(), &out)?,
        Commands::Remove { paths } => cmd_remove(vault, &paths, &out)?,
        Commands::Copy { source, target } => cmd_copy(vault, &source, &target, &out)?,
        Commands::Attach { note, file, name } => {
            cmd_attach(vault, &note, &file, name.as_deref(), &out)?
        }
        Commands::Reindex => cmd_reindex(vault, &out)?,
        Commands::Backup { action } => {
            cmd_backup(vault, action.unwrap_or(BackupAction::Status), &out).await?
        }
    };

    if mutated && !cli.no_backup && vault.backup_status().enabled {
        vault.flush_backup().await;
        let state = wait_idle(vault).await;
        if let Some(error) = &state.last_error {
            eprintln!("{}", render::warning(&format!("backup failed: {}", error)));
        }
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

struct Output {
    json: bool,
}

impl Output {
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            let text = text();
            if !text.is_empty() {
                print!("{}", text);
            }
        }
        Ok(())
    }
}

fn cmd_list(vault: &Vault, notebook: Option<&str>, out: &Output) -> Result<bool> {
    let mut notes = vault.load().unwrap_or_default();
    if let Some(notebook) = notebook {
        notes.retain(|n| n.notebook.eq_ignore_ascii_case(notebook));
    }
    out.emit(&notes, || render::note_list(&notes))?;
    Ok(false)
}

fn cmd_show(vault: &Vault, path: &str, out: &Output) -> Result<bool> {
    let notes = vault.load().unwrap_or_default();
    let note = find(&notes, path).ok_or_else(|| not_found(path))?;
    out.emit(note, || ensure_newline(&note.markdown))?;
    Ok(false)
}

fn cmd_write(vault: &Vault, path: &str, file: Option<&Path>, out: &Output) -> Result<bool> {
    let markdown = match file {
        Some(file) => fs::read_to_string(file)
            .with_context(|| format!("cannot read {}", file.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("cannot read stdin")?;
            buf
        }
    };

    let notes = vault.load().unwrap_or_default();
    let target = sanitize_note_path(path);
    let mut inputs: Vec<NoteInput> = Vec::with_capacity(notes.len() + 1);
    let mut replaced = false;
    for note in &notes {
        if path_key(&note.path) == path_key(&target) {
            // Title, tags and snippet are re-derived from the new body.
            inputs.push(NoteInput {
                id: Some(note.id.clone()),
                created_at: Some(note.created_at),
                is_template: Some(note.is_template),
                ..NoteInput::new(note.path.clone(), markdown.clone())
            });
            replaced = true;
        } else {
            inputs.push(NoteInput::from(note));
        }
    }
    if !replaced {
        inputs.push(NoteInput::new(target, markdown));
    }

    let report = commit(vault, &inputs)?;
    out.emit(&report, || render::save_summary(&report))?;
    Ok(true)
}

fn cmd_remove(vault: &Vault, paths: &[String], out: &Output) -> Result<bool> {
    let notes = vault.load().unwrap_or_default();
    let mut doomed = Vec::with_capacity(paths.len());
    for path in paths {
        let note = find(&notes, path).ok_or_else(|| not_found(path))?;
        doomed.push(path_key(&note.path));
    }

    let inputs: Vec<NoteInput> = notes
        .iter()
        .filter(|n| !doomed.contains(&path_key(&n.path)))
        .map(NoteInput::from)
        .collect();
    let report = commit(vault, &inputs)?;
    out.emit(&report, || render::save_summary(&report))?;
    Ok(true)
}

fn cmd_copy(vault: &Vault, source: &str, target: &str, out: &Output) -> Result<bool> {
    let notes = vault.load().unwrap_or_default();
    let original = find(&notes, source).ok_or_else(|| not_found(source))?;
    let target = sanitize_note_path(target);
    if find(&notes, &target).is_some() {
        bail!("note already exists: {}", target);
    }

    let cloned = vault.clone_attachment_links(&original.path, &target, &original.markdown);
    let mut inputs: Vec<NoteInput> = notes.iter().map(NoteInput::from).collect();
    inputs.push(NoteInput {
        is_template: Some(original.is_template),
        ..NoteInput::new(target, cloned.markdown.clone())
    });

    let report = commit(vault, &inputs)?;
    out.emit(&report, || {
        let mut text = render::save_summary(&report);
        text.push_str(&render::copied_attachments(cloned.copied_count));
        text.push_str(&render::diagnostics(&cloned.diagnostics));
        text
    })?;
    Ok(true)
}

fn cmd_attach(
    vault: &Vault,
    note: &str,
    file: &Path,
    name: Option<&str>,
    out: &Output,
) -> Result<bool> {
    let bytes = fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;
    let name = match name {
        Some(name) => name.to_string(),
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("{} has no file name", file.display()))?,
    };

    let stored = vault
        .store_attachment(note, &name, &STANDARD.encode(&bytes))
        .ok_or_else(|| anyhow!("cannot store attachment {}", name))?;
    out.emit(&stored, || render::stored_attachment(&stored))?;
    Ok(true)
}

fn cmd_reindex(vault: &Vault, out: &Output) -> Result<bool> {
    let loaded = vault.load_with_report();
    let inputs: Vec<NoteInput> = loaded
        .notes
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(NoteInput::from)
        .collect();
    let report = commit(vault, &inputs)?;
    out.emit(&report, || {
        let mut text = render::load_summary(&loaded);
        text.push_str(&render::save_summary(&report));
        text
    })?;
    Ok(true)
}

async fn cmd_backup(vault: &Vault, action: BackupAction, out: &Output) -> Result<bool> {
    let state = match action {
        BackupAction::Status => vault.backup_status(),
        BackupAction::Now => {
            vault.run_backup_now().await;
            wait_idle(vault).await
        }
        BackupAction::Enable => vault.set_backup_enabled(true).await,
        BackupAction::Disable => vault.set_backup_enabled(false).await,
    };
    out.emit(&state, || render::backup_state(&state))?;
    Ok(false)
}

fn commit(vault: &Vault, inputs: &[NoteInput]) -> Result<SaveReport> {
    let report = vault.save_with_report(inputs);
    if !report.committed {
        let detail = report
            .diagnostics
            .iter()
            .map(|d| d.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        bail!("save failed: {}", detail);
    }
    Ok(report)
}

async fn wait_idle(vault: &Vault) -> BackupState {
    let mut rx = vault.subscribe_backup();
    let state = match rx.wait_for(|s| !s.busy && !s.pending).await {
        Ok(state) => state.clone(),
        Err(_) => vault.backup_status(),
    };
    state
}

fn find<'a>(notes: &'a [NoteRecord], path: &str) -> Option<&'a NoteRecord> {
    let key = path_key(&sanitize_note_path(path));
    notes.iter().find(|n| path_key(&n.path) == key)
}

fn not_found(path: &str) -> anyhow::Error {
    anyhow!("note not found: {}", sanitize_note_path(path))
}

fn ensure_newline(text: &str) -> String {
    if text.is_empty() || text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{}\n", text)
    }
}
