use thiserror::Error;

use crate::entity::SyncStatus;

#[derive(Error, Debug)]
pub enum NotemirrorError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Note not found: {0}")]
    NotFound(String),

    #[error("Conflict on note {id}: already synced as {existing}, refusing {attempted}")]
    Conflict {
        id: String,
        existing: String,
        attempted: String,
    },

    #[error("Note {id} is {actual}, expected {expected}")]
    InvalidState {
        id: String,
        expected: SyncStatus,
        actual: SyncStatus,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for NotemirrorError {
    fn from(e: rusqlite::Error) -> Self {
        NotemirrorError::Persistence(format!("SQLite error: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, NotemirrorError>;
