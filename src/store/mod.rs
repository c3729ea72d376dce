//! Local note storage.
//!
//! The store is the durable source of truth: a note exists here before any
//! mirror attempt is made, and only the sync orchestrator moves it between
//! sync states.

mod sqlite_store;

pub use sqlite_store::SqliteNoteStore;

use crate::entity::{Author, Note, NoteId, RemoteRef, SyncStatus};
use crate::error::Result;

/// Durable record of notes and their sync status.
///
/// Every operation is atomic with respect to other operations on the same
/// note, and a write is visible to reads as soon as the call returns.
pub trait NoteStore: Send + Sync + 'static {
    /// Persist a new `Pending` note. Rejects empty or whitespace-only text
    /// with a validation error.
    fn create(&self, author: &Author, text: &str) -> Result<Note>;

    /// Move a note to `Synced` with the given remote reference.
    ///
    /// Repeating the call with the same reference is a no-op; a different
    /// reference on an already synced note is a conflict.
    fn mark_synced(&self, id: &NoteId, remote_ref: &RemoteRef) -> Result<()>;

    /// Record a failed mirror attempt. A synced note is left untouched.
    fn mark_failed(&self, id: &NoteId, reason: &str) -> Result<()>;

    fn get(&self, id: &NoteId) -> Result<Note>;

    /// Claim a `Failed` note for another mirror attempt by moving it back to
    /// `Pending`. Any other current status is an invalid-state error.
    fn begin_retry(&self, id: &NoteId) -> Result<Note>;

    /// Notes in creation order, optionally restricted to one status.
    fn list(&self, status: Option<SyncStatus>, limit: usize) -> Result<Vec<Note>>;

    fn count(&self, status: Option<SyncStatus>) -> Result<u64>;
}
