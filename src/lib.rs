pub mod cli;
pub mod config;
pub mod entity;
pub mod error;
pub mod logging;
pub mod mirror;
pub mod store;
pub mod sync;
pub mod webhook;

#[cfg(test)]
mod testing;

pub use entity::{Author, Note, NoteId, NoteRequest, RemoteRef, SyncState, SyncStatus};
pub use error::{NotemirrorError, Result};
pub use mirror::{MirrorClient, MirrorError, NotionClient};
pub use store::{NoteStore, SqliteNoteStore};
pub use sync::{OutcomeStatus, RetryReport, SyncOrchestrator};
