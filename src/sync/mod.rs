//! Save-then-mirror orchestration.
//!
//! Every inbound note is committed to the local store before the mirror is
//! contacted. A mirror failure never loses the note: it is recorded as a
//! `Failed` sync state and reported as a degraded but successful outcome.
//! `retry_sync` is the only way out of `Failed`.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_MIRROR_TIMEOUT;
use crate::entity::{Note, NoteId, NoteRequest, SyncStatus};
use crate::error::{NotemirrorError, Result};
use crate::mirror::{MirrorClient, MirrorError};
use crate::store::NoteStore;

/// What one request achieved, as reported back to the chat user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    /// No usable text; nothing was stored.
    RejectedEmpty,
    /// Stored locally and mirrored.
    SavedAndSynced,
    /// Stored locally; the mirror attempt failed and can be retried.
    SavedSyncFailed,
}

impl OutcomeStatus {
    pub fn user_message(&self) -> &'static str {
        match self {
            OutcomeStatus::RejectedEmpty => "Please provide note text.",
            OutcomeStatus::SavedAndSynced => "Note saved and synced.",
            OutcomeStatus::SavedSyncFailed => "Note saved locally but failed to sync.",
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::RejectedEmpty => write!(f, "rejected_empty"),
            OutcomeStatus::SavedAndSynced => write!(f, "saved_and_synced"),
            OutcomeStatus::SavedSyncFailed => write!(f, "saved_sync_failed"),
        }
    }
}

/// Totals of a `retry_failed` sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryReport {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    /// Notes claimed by a concurrent retry before this sweep reached them.
    pub skipped: usize,
}

/// Drives the local store and the mirror client for single notes.
pub struct SyncOrchestrator<S, M> {
    store: Arc<S>,
    mirror: Arc<M>,
    push_timeout: Duration,
}

impl<S, M> Clone for SyncOrchestrator<S, M> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            mirror: Arc::clone(&self.mirror),
            push_timeout: self.push_timeout,
        }
    }
}

impl<S: NoteStore, M: MirrorClient> SyncOrchestrator<S, M> {
    pub fn new(store: Arc<S>, mirror: Arc<M>) -> Self {
        Self {
            store,
            mirror,
            push_timeout: DEFAULT_MIRROR_TIMEOUT,
        }
    }

    /// Bound every mirror push, whatever the client does internally.
    pub fn with_push_timeout(mut self, timeout: Duration) -> Self {
        self.push_timeout = timeout;
        self
    }

    /// Save the note, then try to mirror it.
    ///
    /// Only store failures are returned as errors; a failed mirror attempt
    /// yields `SavedSyncFailed`.
    pub async fn handle_note_request(&self, request: &NoteRequest) -> Result<OutcomeStatus> {
        let text = request.raw_text.trim();
        if text.is_empty() {
            debug!(author = %request.author.author_ref, "empty note rejected");
            return Ok(OutcomeStatus::RejectedEmpty);
        }

        let author = request.author.clone();
        let text = text.to_string();
        let note = self
            .with_store(move |store| store.create(&author, &text))
            .await?;
        info!(note_id = %note.id, author = %note.author_ref, "note saved");

        self.mirror_note(&note).await
    }

    /// Mirror a `Failed` note again.
    ///
    /// The note is claimed (`Failed` to `Pending`) before the push, so a
    /// `Pending` or `Synced` note is refused with an invalid-state error and
    /// never reaches the mirror.
    pub async fn retry_sync(&self, id: &NoteId) -> Result<OutcomeStatus> {
        let id = *id;
        let note = self.with_store(move |store| store.begin_retry(&id)).await?;
        info!(note_id = %note.id, "retrying mirror");
        self.mirror_note(&note).await
    }

    /// Retry up to `limit` failed notes, oldest first, one at a time.
    pub async fn retry_failed(&self, limit: usize) -> Result<RetryReport> {
        let failed = self
            .with_store(move |store| store.list(Some(SyncStatus::Failed), limit))
            .await?;
        let mut report = RetryReport::default();

        for note in failed {
            report.attempted += 1;
            match self.retry_sync(&note.id).await {
                Ok(OutcomeStatus::SavedAndSynced) => report.synced += 1,
                Ok(_) => report.failed += 1,
                Err(NotemirrorError::InvalidState { .. }) => {
                    debug!(note_id = %note.id, "note already claimed, skipping");
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            attempted = report.attempted,
            synced = report.synced,
            failed = report.failed,
            skipped = report.skipped,
            "retry sweep finished"
        );
        Ok(report)
    }

    /// Run a store call on the blocking pool, so a busy database parks a
    /// blocking thread instead of a runtime worker.
    async fn with_store<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|e| NotemirrorError::Persistence(format!("store task failed: {}", e)))?
    }

    async fn mirror_note(&self, note: &Note) -> Result<OutcomeStatus> {
        let pushed = match tokio::time::timeout(self.push_timeout, self.mirror.push(note)).await {
            Ok(result) => result,
            Err(_) => Err(MirrorError::Unavailable(format!(
                "push timed out after {}ms",
                self.push_timeout.as_millis()
            ))),
        };

        match pushed {
            Ok(remote_ref) => {
                let id = note.id;
                let recorded = remote_ref.clone();
                if let Err(e) = self
                    .with_store(move |store| store.mark_synced(&id, &recorded))
                    .await
                {
                    // The remote page exists but the note stays pending.
                    error!(
                        note_id = %note.id,
                        mirror = self.mirror.name(),
                        remote_ref = %remote_ref,
                        error = %e,
                        "note mirrored but sync state not recorded, remote page needs manual reconciliation"
                    );
                    return Err(e);
                }
                info!(
                    note_id = %note.id,
                    mirror = self.mirror.name(),
                    remote_ref = %remote_ref,
                    "note synced"
                );
                Ok(OutcomeStatus::SavedAndSynced)
            }
            Err(err) => {
                let id = note.id;
                let reason = err.to_string();
                self.with_store(move |store| store.mark_failed(&id, &reason))
                    .await?;
                warn!(
                    note_id = %note.id,
                    mirror = self.mirror.name(),
                    retryable = err.is_retryable(),
                    error = %err,
                    "note sync failed"
                );
                Ok(OutcomeStatus::SavedSyncFailed)
            }
        }
    }
}
