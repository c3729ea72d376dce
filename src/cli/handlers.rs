use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::commands::{NotionArgs, ServeArgs};
use crate::config::AppConfig;
use crate::entity::{Note, NoteId, SyncStatus};
use crate::error::{NotemirrorError, Result};
use crate::mirror::NotionClient;
use crate::store::{NoteStore, SqliteNoteStore};
use crate::sync::{OutcomeStatus, SyncOrchestrator};
use crate::webhook::{self, AppState, TelegramReplier};

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn parse_note_id(id: &str) -> Result<NoteId> {
    id.parse().map_err(NotemirrorError::Validation)
}

fn orchestrator(
    database: &Path,
    notion: NotionArgs,
) -> Result<SyncOrchestrator<SqliteNoteStore, NotionClient>> {
    let notion = notion.into_config();
    notion.validate()?;

    let store = SqliteNoteStore::open(database)?;
    let timeout = notion.timeout;
    let mirror = NotionClient::new(notion)?;
    Ok(SyncOrchestrator::new(Arc::new(store), Arc::new(mirror)).with_push_timeout(timeout))
}

pub fn handle_serve(database: &Path, args: ServeArgs) -> Result<()> {
    let config = AppConfig {
        database_path: database.to_path_buf(),
        listen_addr: args.listen,
        env: args.app_env,
        telegram: args.telegram.into_config(),
        notion: args.notion.into_config(),
    }
    .validate()?;

    info!(env = %config.env, database = %config.database_path.display(), "starting notemirror");

    let store = Arc::new(SqliteNoteStore::open(&config.database_path)?);
    let pending = store.count(Some(SyncStatus::Pending))?;
    if pending > 0 {
        // Left behind by a previous process that stopped mid-request.
        warn!(pending, "notes still pending from an earlier run");
    }

    let mirror = Arc::new(NotionClient::new(config.notion.clone())?);
    let orchestrator =
        SyncOrchestrator::new(store, mirror).with_push_timeout(config.notion.timeout);
    let replier = Arc::new(TelegramReplier::new(config.telegram.clone())?);
    let router = webhook::router(AppState::new(
        orchestrator,
        replier,
        config.telegram.webhook_secret.as_str(),
    ));

    runtime()?.block_on(async move {
        let listener = TcpListener::bind(config.listen_addr).await?;
        let shutdown = CancellationToken::new();

        let signal = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
            }
            signal.cancel();
        });

        webhook::serve(listener, router, shutdown).await?;
        info!("notemirror stopped");
        Ok(())
    })
}

pub fn handle_retry(
    database: &Path,
    id: Option<String>,
    limit: usize,
    notion: NotionArgs,
    json: bool,
) -> Result<()> {
    let note_id = id.as_deref().map(parse_note_id).transpose()?;
    let orchestrator = orchestrator(database, notion)?;
    let rt = runtime()?;

    match note_id {
        Some(note_id) => {
            let outcome = rt.block_on(orchestrator.retry_sync(&note_id))?;
            if json {
                #[derive(serde::Serialize)]
                struct RetryJson {
                    id: String,
                    outcome: OutcomeStatus,
                }
                let out = RetryJson {
                    id: note_id.to_string(),
                    outcome,
                };
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}: {}", note_id, outcome.user_message());
            }
        }
        None => {
            let report = rt.block_on(orchestrator.retry_failed(limit))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.attempted == 0 {
                println!("No failed notes to retry.");
            } else {
                println!(
                    "Retried {} note(s): {} synced, {} still failing, {} skipped",
                    report.attempted, report.synced, report.failed, report.skipped
                );
            }
        }
    }

    Ok(())
}

pub fn handle_list(
    database: &Path,
    status: Option<String>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let status = status
        .as_deref()
        .map(str::parse::<SyncStatus>)
        .transpose()
        .map_err(NotemirrorError::Validation)?;

    let store = SqliteNoteStore::open(database)?;
    let notes = store.list(status, limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
    } else if notes.is_empty() {
        println!("No notes found.");
    } else {
        for note in &notes {
            println!(
                "{} [{:<7}] {} {:<12} {}",
                note.short_id(),
                note.sync_status(),
                note.created_at.format("%Y-%m-%d %H:%M"),
                note.author_name.as_deref().unwrap_or(&note.author_ref),
                preview(&note.text, 60)
            );
        }
    }

    Ok(())
}

pub fn handle_get(database: &Path, id: String, json: bool) -> Result<()> {
    let id = parse_note_id(&id)?;
    let store = SqliteNoteStore::open(database)?;
    let note = store.get(&id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&note)?);
    } else {
        print_note(&note);
    }

    Ok(())
}

fn print_note(note: &Note) {
    println!("ID:       {}", note.id);
    match &note.author_name {
        Some(name) => println!("Author:   {} ({})", note.author_ref, name),
        None => println!("Author:   {}", note.author_ref),
    }
    println!("Created:  {}", note.created_at.to_rfc3339());
    println!("Status:   {}", note.sync_status());
    if let Some(remote_ref) = note.remote_ref() {
        println!("Remote:   {}", remote_ref);
    }
    if let Some(error) = note.last_error() {
        println!("Error:    {}", error);
    }
    println!();
    println!("{}", note.text);
}

/// First line of `text`, cut to `max` characters.
fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    let mut out: String = line.chars().take(max).collect();
    if line.chars().count() > max || text.lines().nth(1).is_some() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview() {
        assert_eq!(preview("Buy milk", 60), "Buy milk");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("first\nsecond", 60), "first...");
    }

    #[test]
    fn test_parse_note_id_rejects_prefixes() {
        assert!(matches!(
            parse_note_id("a1b2c3").unwrap_err(),
            NotemirrorError::Validation(_)
        ));
    }
}
