use notevault::model::NoteInput;
use notevault::report::LoadSource;
use notevault::store::{IndexStore, StoreOptions, VaultStore, INDEX_FILE};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn setup() -> (TempDir, VaultStore) {
    let dir = TempDir::new().unwrap();
    let store = VaultStore::new(dir.path().join("vault"), StoreOptions::default());
    (dir, store)
}

fn file_set(root: &Path) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.insert(path.strip_prefix(root).unwrap().display().to_string());
            }
        }
    }
    out
}

#[test]
fn test_hello_scenario() {
    let (_dir, store) = setup();
    assert!(store.save(&[NoteInput::new(
        "Inbox/Hello",
        "# Hello\n\nWorld #demo [[Other]]"
    )]));

    let index = IndexStore::new(store.root()).read();
    assert_eq!(index.entries.len(), 1);
    let entry = &index.entries[0];
    assert_eq!(entry.path, "Inbox/Hello.md");
    assert_eq!(entry.title, "Hello");
    assert_eq!(entry.tags, vec!["demo"]);
    assert_eq!(entry.links_out, vec!["Other"]);
    assert_eq!(
        fs::read_to_string(store.root().join("Inbox/Hello.md")).unwrap(),
        "# Hello\n\nWorld #demo [[Other]]"
    );

    let raw = fs::read_to_string(store.root().join(INDEX_FILE)).unwrap();
    assert!(raw.contains("\"linksOut\""));
    assert!(!raw.contains("markdown"));
}

#[test]
fn test_save_load_is_idempotent() {
    let (_dir, store) = setup();
    store.save(&[
        NoteInput::new("Inbox/Hello", "# Hello\n\nWorld"),
        NoteInput::new("Work/Plans/Q1", "# Q1\n#planning"),
        NoteInput::new("loose", "no heading"),
    ]);

    let round = |store: &VaultStore| {
        let notes = store.load().unwrap();
        let inputs: Vec<NoteInput> = notes.iter().map(NoteInput::from).collect();
        assert!(store.save(&inputs));
        (
            fs::read_to_string(store.root().join(INDEX_FILE)).unwrap(),
            file_set(store.root()),
        )
    };

    let first = round(&store);
    let second = round(&store);
    assert_eq!(first, second);
    assert!(!first.1.iter().any(|p| p.contains(" 2")));
}

#[test]
fn test_duplicate_titles_never_share_a_file() {
    let (_dir, store) = setup();
    let report = store.save_with_report(&[
        NoteInput::new("Notes/Untitled.md", "first"),
        NoteInput::new("Notes/Untitled.md", "second"),
    ]);

    let paths: Vec<_> = report.entries.iter().map(|e| e.path.clone()).collect();
    assert_eq!(paths, vec!["Notes/Untitled.md", "Notes/Untitled 2.md"]);
    assert_eq!(
        fs::read_to_string(store.root().join("Notes/Untitled 2.md")).unwrap(),
        "second"
    );
}

#[test]
fn test_traversal_stays_inside_vault() {
    let (dir, store) = setup();
    store.save(&[NoteInput::new("../../etc/passwd", "nope")]);

    assert!(store.root().join("etc/passwd.md").is_file());
    assert!(!dir.path().join("etc").exists());
}

#[test]
fn test_removed_note_prunes_directories_but_not_root() {
    let (_dir, store) = setup();
    store.save(&[NoteInput::new("A/B/note", "x")]);
    let report = store.save_with_report(&[]);

    assert!(report.committed);
    assert_eq!(report.removed, vec!["A/B/note.md"]);
    assert!(!store.root().join("A").exists());
    assert!(store.root().is_dir());
}

#[test]
fn test_hydration_falls_back_to_scan_without_index() {
    let (_dir, store) = setup();
    store.save(&[
        NoteInput::new("Inbox/Hello", "# Hello"),
        NoteInput::new("Other", "# Other"),
    ]);
    fs::remove_file(store.root().join(INDEX_FILE)).unwrap();

    let report = store.load_with_report();
    assert_eq!(report.source, LoadSource::Scan);
    let notes = report.notes.unwrap();
    let titles: Vec<_> = notes.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["Hello", "Other"]);
    assert_eq!(notes[0].notebook, "Inbox");
    assert_eq!(notes[1].notebook, "Notes");
}

#[test]
fn test_index_pointing_at_nothing_falls_back_to_scan() {
    let (_dir, store) = setup();
    fs::create_dir_all(store.root()).unwrap();
    fs::write(store.root().join("real.md"), "# Real").unwrap();
    fs::write(
        store.root().join(INDEX_FILE),
        r#"[{"path":"ghost.md","title":"Ghost"}]"#,
    )
    .unwrap();

    let report = store.load_with_report();
    assert_eq!(report.source, LoadSource::Scan);
    assert_eq!(report.stale_entries, 1);
    assert_eq!(report.notes.unwrap()[0].title, "Real");
}

#[test]
fn test_scan_ignores_git_directory() {
    let (_dir, store) = setup();
    fs::create_dir_all(store.root().join(".git/refs")).unwrap();
    fs::write(store.root().join(".git/refs/README.md"), "# Not a note").unwrap();

    assert!(store.load().is_none());
}

#[test]
fn test_custom_notebook_default() {
    let dir = TempDir::new().unwrap();
    let store = VaultStore::new(
        dir.path(),
        StoreOptions {
            default_notebook: "Inbox".to_string(),
            snippet_length: 5,
        },
    );
    let report = store.save_with_report(&[NoteInput::new("root", "abcdefghij")]);
    assert_eq!(report.entries[0].notebook, "Inbox");
    assert_eq!(report.entries[0].snippet, "abcde");
}
