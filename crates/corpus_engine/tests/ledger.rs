use std::fs;
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use corpus_core::ProgressEntry;
use corpus_engine::{load_ledger, LedgerAppender, LedgerError};
use tempfile::TempDir;

#[test]
fn missing_ledger_is_empty() {
    let temp = TempDir::new().unwrap();
    let snapshot = load_ledger(&temp.path().join("data.jsonl")).unwrap();
    assert!(snapshot.is_empty());
}

#[test]
fn corrupt_ledger_fails_the_load() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.jsonl");
    fs::write(
        &path,
        "{\"doc_id\": \"a\", \"uri\": \"https://a\", \"date_built\": \"x\"}\nnot json\n",
    )
    .unwrap();

    match load_ledger(&path) {
        Err(LedgerError::Corruption(err)) => assert_eq!(err.line, 2),
        other => panic!("expected corruption, got {other:?}"),
    }
}

#[test]
fn appends_extend_existing_ledger() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("data.jsonl");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "{\"doc_id\": \"old\", \"uri\": \"https://old\", \"date_built\": \"x\"}\n").unwrap();

    let appender = LedgerAppender::open(&path).unwrap();
    appender
        .append(&ProgressEntry::new("new", "https://new", Utc::now()))
        .unwrap();

    let snapshot = load_ledger(&path).unwrap();
    assert!(snapshot.contains("https://old"));
    assert!(snapshot.contains("https://new"));
}

#[test]
fn concurrent_appends_keep_lines_whole() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.jsonl");
    let appender = Arc::new(LedgerAppender::open(&path).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let appender = appender.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    let entry = ProgressEntry::new(
                        format!("doc_{worker}_{i}"),
                        format!("https://example.com/{worker}/{i}/{}", "x".repeat(200)),
                        Utc::now(),
                    );
                    appender.append(&entry).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 200);
    let snapshot = load_ledger(&path).unwrap();
    assert_eq!(snapshot.len(), 200);
}
