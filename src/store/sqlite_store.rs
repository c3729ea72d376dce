use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info, warn};

use super::NoteStore;
use crate::entity::{Author, Note, NoteId, RemoteRef, SyncState, SyncStatus};
use crate::error::{NotemirrorError, Result};

const NOTE_COLUMNS: &str =
    "id, author_ref, author_name, text, created_at, sync_status, remote_ref, last_error";

/// SQLite-backed note store.
///
/// One connection guarded by a mutex; every mutation runs in its own
/// `BEGIN IMMEDIATE` transaction, so status transitions on the same note are
/// serialized and never observed half-applied.
pub struct SqliteNoteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteNoteStore {
    /// Open or create the note database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        let store = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        store.init_schema()?;
        info!(path = %path.display(), "note store opened");
        Ok(store)
    }

    /// Private in-memory database, gone when the store is dropped
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| NotemirrorError::Persistence("note store lock poisoned".to_string()))
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        // The CHECK constraints mirror SyncState: a remote ref exists exactly
        // when the note is synced, and an error reason only when it failed.
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                author_ref TEXT NOT NULL,
                author_name TEXT,
                text TEXT NOT NULL CHECK (length(trim(text)) > 0),
                created_at TEXT NOT NULL,
                sync_status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (sync_status IN ('pending', 'synced', 'failed')),
                remote_ref TEXT,
                last_error TEXT,
                CHECK ((sync_status = 'synced') = (remote_ref IS NOT NULL)),
                CHECK (last_error IS NULL OR sync_status = 'failed')
            );

            CREATE INDEX IF NOT EXISTS idx_notes_author_ref ON notes(author_ref);
            CREATE INDEX IF NOT EXISTS idx_notes_created_at ON notes(created_at);
            CREATE INDEX IF NOT EXISTS idx_notes_sync_status ON notes(sync_status);
            ",
        )?;

        Ok(())
    }
}

/// Read the current status and remote ref of a note inside a transaction.
fn current_state(
    conn: &Connection,
    id: &NoteId,
) -> Result<(SyncStatus, Option<String>)> {
    let row: Option<(String, Option<String>)> = conn
        .query_row(
            "SELECT sync_status, remote_ref FROM notes WHERE id = ?1",
            [id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let (status, remote_ref) = row.ok_or_else(|| NotemirrorError::NotFound(id.to_string()))?;
    let status = status
        .parse::<SyncStatus>()
        .map_err(NotemirrorError::Persistence)?;
    Ok((status, remote_ref))
}

fn select_note(conn: &Connection, id: &NoteId) -> Result<Note> {
    let row = conn
        .query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
            [id.to_string()],
            NoteRow::from_row,
        )
        .optional()?;

    row.ok_or_else(|| NotemirrorError::NotFound(id.to_string()))?
        .into_note()
}

impl NoteStore for SqliteNoteStore {
    fn create(&self, author: &Author, text: &str) -> Result<Note> {
        if text.trim().is_empty() {
            return Err(NotemirrorError::Validation(
                "note text must not be empty".to_string(),
            ));
        }

        let note = Note::new(author, text.to_string());
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO notes (id, author_ref, author_name, text, created_at, sync_status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                note.id.to_string(),
                note.author_ref,
                note.author_name,
                note.text,
                note.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                SyncStatus::Pending.as_str(),
            ],
        )?;

        debug!(note_id = %note.id, author = %note.author_ref, "note created");
        Ok(note)
    }

    fn mark_synced(&self, id: &NoteId, remote_ref: &RemoteRef) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (status, existing) = current_state(&tx, id)?;
        if status == SyncStatus::Synced {
            return match existing {
                Some(existing) if existing == remote_ref.as_str() => Ok(()),
                existing => Err(NotemirrorError::Conflict {
                    id: id.to_string(),
                    existing: existing.unwrap_or_default(),
                    attempted: remote_ref.to_string(),
                }),
            };
        }

        tx.execute(
            "UPDATE notes SET sync_status = ?1, remote_ref = ?2, last_error = NULL WHERE id = ?3",
            params![SyncStatus::Synced.as_str(), remote_ref.as_str(), id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn mark_failed(&self, id: &NoteId, reason: &str) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (status, _) = current_state(&tx, id)?;
        if status == SyncStatus::Synced {
            warn!(note_id = %id, "ignoring failure report for an already synced note");
            return Ok(());
        }

        tx.execute(
            "UPDATE notes SET sync_status = ?1, last_error = ?2 WHERE id = ?3",
            params![SyncStatus::Failed.as_str(), reason, id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get(&self, id: &NoteId) -> Result<Note> {
        let conn = self.lock()?;
        select_note(&conn, id)
    }

    fn begin_retry(&self, id: &NoteId) -> Result<Note> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (status, _) = current_state(&tx, id)?;
        if status != SyncStatus::Failed {
            return Err(NotemirrorError::InvalidState {
                id: id.to_string(),
                expected: SyncStatus::Failed,
                actual: status,
            });
        }

        tx.execute(
            "UPDATE notes SET sync_status = ?1, last_error = NULL WHERE id = ?2",
            params![SyncStatus::Pending.as_str(), id.to_string()],
        )?;
        let note = select_note(&tx, id)?;
        tx.commit()?;
        Ok(note)
    }

    fn list(&self, status: Option<SyncStatus>, limit: usize) -> Result<Vec<Note>> {
        let conn = self.lock()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {NOTE_COLUMNS} FROM notes WHERE sync_status = ?1
                     ORDER BY created_at, rowid LIMIT ?2"
                ))?;
                let rows = stmt
                    .query_map(params![status.as_str(), limit], NoteRow::from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {NOTE_COLUMNS} FROM notes ORDER BY created_at, rowid LIMIT ?1"
                ))?;
                let rows = stmt
                    .query_map([limit], NoteRow::from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
        };

        rows.into_iter().map(NoteRow::into_note).collect()
    }

    fn count(&self, status: Option<SyncStatus>) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 = match status {
            Some(status) => conn.query_row(
                "SELECT COUNT(*) FROM notes WHERE sync_status = ?1",
                [status.as_str()],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?,
        };
        Ok(count.max(0) as u64)
    }
}

/// Raw column values of one `notes` row
struct NoteRow {
    id: String,
    author_ref: String,
    author_name: Option<String>,
    text: String,
    created_at: String,
    sync_status: String,
    remote_ref: Option<String>,
    last_error: Option<String>,
}

impl NoteRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            author_ref: row.get(1)?,
            author_name: row.get(2)?,
            text: row.get(3)?,
            created_at: row.get(4)?,
            sync_status: row.get(5)?,
            remote_ref: row.get(6)?,
            last_error: row.get(7)?,
        })
    }

    fn into_note(self) -> Result<Note> {
        let id = self
            .id
            .parse::<NoteId>()
            .map_err(NotemirrorError::Persistence)?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| {
                NotemirrorError::Persistence(format!("bad created_at on note {}: {}", id, e))
            })?
            .with_timezone(&Utc);
        let status = self
            .sync_status
            .parse::<SyncStatus>()
            .map_err(NotemirrorError::Persistence)?;

        let sync = match (status, self.remote_ref) {
            (SyncStatus::Pending, None) => SyncState::Pending,
            (SyncStatus::Synced, Some(remote_ref)) => SyncState::Synced {
                remote_ref: RemoteRef::new(remote_ref),
            },
            (SyncStatus::Failed, None) => SyncState::Failed {
                reason: self.last_error.unwrap_or_default(),
            },
            (status, remote_ref) => {
                return Err(NotemirrorError::Persistence(format!(
                    "note {} is {} with remote ref {:?}",
                    id, status, remote_ref
                )))
            }
        };

        Ok(Note {
            id,
            author_ref: self.author_ref,
            author_name: self.author_name,
            text: self.text,
            created_at,
            sync,
        })
    }
}
