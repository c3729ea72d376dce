use std::net::TcpListener;
use std::path::Path;
use std::process::{Command, Output};

use clap::Parser;
use notemirror::cli::{Cli, Commands};
use notemirror::{Author, NoteStore, SqliteNoteStore, SyncStatus};
use tempfile::TempDir;

fn notemirror(database: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_notemirror"))
        .arg("--database")
        .arg(database)
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("NOTION_TOKEN")
        .env_remove("NOTION_DATABASE_ID")
        .env_remove("NOTION_API_BASE")
        .output()
        .expect("failed to run notemirror binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// An address nothing listens on.
fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

#[test]
fn test_serve_arguments_parse() {
    let cli = Cli::try_parse_from([
        "notemirror",
        "serve",
        "--listen",
        "127.0.0.1:8080",
        "--telegram-bot-token",
        "123:abc",
        "--telegram-webhook-secret",
        "hook-secret",
        "--telegram-api-base",
        "http://127.0.0.1:9001",
        "--notion-token",
        "secret_test",
        "--notion-database-id",
        "db-1",
        "--notion-api-base",
        "http://127.0.0.1:9002",
    ])
    .unwrap();

    match cli.command {
        Commands::Serve(args) => {
            assert_eq!(args.listen.port(), 8080);
            let telegram = args.telegram.into_config();
            let notion = args.notion.into_config();
            assert_eq!(telegram.api_base, "http://127.0.0.1:9001");
            assert_eq!(notion.api_base, "http://127.0.0.1:9002");
            assert_eq!(notion.database_id, "db-1");
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_serve_help() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("notes.db");

    let output = notemirror(&db, &["serve", "--help"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("--telegram-api-base"));
    assert!(text.contains("--notion-api-base"));
}

#[test]
fn test_list_on_empty_database() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("notes.db");

    let output = notemirror(&db, &["list"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("No notes found."));
}

#[test]
fn test_get_rejects_malformed_id() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("notes.db");

    let output = notemirror(&db, &["get", "abc123"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Invalid note id"));
}

#[test]
fn test_get_unknown_note() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("notes.db");

    let output = notemirror(&db, &["get", "8c0d3c5e-2f57-4a53-9b6e-0d7f0f3a9a11"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Note not found"));
}

#[test]
fn test_list_and_get_seeded_notes() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("notes.db");

    let failed_id = {
        let store = SqliteNoteStore::open(&db).unwrap();
        store
            .create(&Author::new("u1").with_name(Some("Ada".to_string())), "Buy milk")
            .unwrap();
        let note = store.create(&Author::new("u2"), "Call mom").unwrap();
        store.mark_failed(&note.id, "upstream returned 503").unwrap();
        note.id
    };

    let output = notemirror(&db, &["list", "--status", "failed", "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let notes: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let notes = notes.as_array().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["text"], "Call mom");
    assert_eq!(notes[0]["status"], "failed");
    assert_eq!(notes[0]["reason"], "upstream returned 503");

    let output = notemirror(&db, &["get", &failed_id.to_string()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("Status:   failed"));
    assert!(text.contains("Call mom"));

    let output = notemirror(&db, &["list"]);
    let text = stdout(&output);
    assert!(text.contains("Ada"));
    assert!(text.contains("Buy milk"));
}

#[test]
fn test_list_rejects_unknown_status() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("notes.db");

    let output = notemirror(&db, &["list", "--status", "done"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Invalid sync status"));
}

#[test]
fn test_retry_with_unreachable_mirror_keeps_note_failed() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("notes.db");

    let id = {
        let store = SqliteNoteStore::open(&db).unwrap();
        let note = store.create(&Author::new("u1"), "Buy milk").unwrap();
        store.mark_failed(&note.id, "timed out").unwrap();
        note.id
    };

    let api_base = closed_port_url();
    let output = notemirror(
        &db,
        &[
            "retry",
            &id.to_string(),
            "--notion-token",
            "secret_test",
            "--notion-database-id",
            "db-1",
            "--notion-api-base",
            &api_base,
            "--notion-timeout-secs",
            "2",
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("failed to sync"));

    let store = SqliteNoteStore::open(&db).unwrap();
    let note = store.get(&id).unwrap();
    assert_eq!(note.sync_status(), SyncStatus::Failed);
    assert_eq!(note.text, "Buy milk");
}

#[test]
fn test_retry_sweep_with_nothing_failed() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("notes.db");

    let output = notemirror(
        &db,
        &[
            "retry",
            "--notion-token",
            "secret_test",
            "--notion-database-id",
            "db-1",
            "--notion-api-base",
            &closed_port_url(),
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("No failed notes to retry."));
}
