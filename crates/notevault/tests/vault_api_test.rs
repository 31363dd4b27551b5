use notevault::api::Vault;
use notevault::backup::{BackupScheduler, GitRunner, SchedulerOptions, SettingsStore};
use notevault::model::NoteInput;
use notevault::store::{StoreOptions, VaultStore};
use serde_json::json;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const PNG_B64: &str = "iVBORw0KGgo=";

fn setup() -> (TempDir, Vault) {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("vault");
    let scheduler = BackupScheduler::spawn(
        Arc::new(GitRunner::new("notevault-test-no-such-git")),
        SettingsStore::new(dir.path()),
        SchedulerOptions {
            debounce: Duration::from_millis(20),
            ..SchedulerOptions::new(&root)
        },
    );
    let vault = Vault::new(VaultStore::new(&root, StoreOptions::default()), scheduler);
    (dir, vault)
}

#[tokio::test]
async fn test_missing_git_degrades_gracefully() {
    let (_dir, vault) = setup();
    assert!(vault.save(&[NoteInput::new("a", "# A")]));

    let mut rx = vault.subscribe_backup();
    let state = rx.wait_for(|s| s.runs >= 1 && !s.busy).await.unwrap().clone();
    assert_eq!(state.available, Some(false));
    assert_eq!(state.last_error, None);
    assert_eq!(state.last_reason.as_deref(), Some("notes-save"));
}

#[tokio::test]
async fn test_duplicate_note_with_attachments() {
    let (_dir, vault) = setup();
    let stored = vault
        .store_attachment("Trips/Rome", "Colosseum (night).PNG", PNG_B64)
        .unwrap();
    assert_eq!(stored.stored_path, "Trips/attachments/Colosseum (night).png");
    assert_eq!(stored.relative_path, "./attachments/Colosseum%20%28night%29.png");

    let markdown = format!(
        "# Rome\n![photo]({}) and [site](https://example.com) [top](#rome)",
        stored.relative_path
    );
    vault.save(&[NoteInput::new("Trips/Rome", markdown.clone())]);

    let outcome = vault.clone_attachment_links("Trips/Rome", "Archive/Rome copy", &markdown);
    assert_eq!(outcome.copied_count, 1);
    assert!(outcome
        .markdown
        .contains("![photo](./attachments/Colosseum%20%28night%29.png)"));
    assert!(outcome.markdown.contains("[site](https://example.com)"));
    assert!(outcome.markdown.contains("[top](#rome)"));

    vault.save(&[
        NoteInput::new("Trips/Rome", markdown),
        NoteInput::new("Archive/Rome copy", outcome.markdown),
    ]);
    // Deleting the original leaves the copy's image intact.
    vault.save(&[NoteInput::new("Archive/Rome copy", "kept")]);
    let copy = vault
        .root()
        .join("Archive/attachments/Colosseum (night).png");
    assert_eq!(fs::read(copy).unwrap().len(), 8);
}

#[tokio::test]
async fn test_save_json_contract() {
    let (_dir, vault) = setup();
    assert!(!vault.save_json(&json!("not a list")));
    assert!(vault.save_json(&json!([
        {"path": "Inbox/One", "markdown": "# One"},
        {"markdown": 7},
        {"title": "Two", "content": "# Two"}
    ])));

    let notes = vault.load().unwrap();
    let paths: Vec<_> = notes.iter().map(|n| n.path.as_str()).collect();
    assert_eq!(paths, vec!["Inbox/One.md", "Two.md"]);
}

#[tokio::test]
async fn test_backup_toggle_round_trip() {
    let (dir, vault) = setup();
    let state = vault.set_backup_enabled(false).await;
    assert!(!state.enabled);
    assert!(fs::read_to_string(dir.path().join(".vault-git-backup.json"))
        .unwrap()
        .contains("false"));

    let state = vault.set_backup_enabled(true).await;
    assert!(state.enabled);
    assert!(vault.backup_status().enabled);
}

#[tokio::test]
async fn test_markdown_attachment_is_not_a_note() {
    let (_dir, vault) = setup();
    vault.save(&[NoteInput::new("Inbox/Hello", "# Hello")]);
    let stored = vault
        .store_attachment("Inbox/Hello", "readme.md", "IyBSZWFkbWU=")
        .unwrap();
    assert_eq!(stored.stored_path, "Inbox/attachments/readme.md");

    let notes = vault.load().unwrap();
    let paths: Vec<_> = notes.iter().map(|n| n.path.as_str()).collect();
    assert_eq!(paths, vec!["Inbox/Hello.md"]);

    let inputs: Vec<NoteInput> = notes.iter().map(NoteInput::from).collect();
    assert!(vault.save(&inputs));
    assert!(vault.root().join("Inbox/attachments/readme.md").is_file());
}
