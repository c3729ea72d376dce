// src/entity/note.rs
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Author;

/// Opaque note identifier, assigned once at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(Uuid);

impl NoteId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NoteId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| format!("Invalid note id: {}", s))
    }
}

impl From<Uuid> for NoteId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Identifier handed back by the mirror service. Only compared, never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteRef(String);

impl RemoteRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Flat sync status tag, as stored in the `sync_status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Pending,
    Synced,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(SyncStatus::Pending),
            "synced" => Ok(SyncStatus::Synced),
            "failed" => Ok(SyncStatus::Failed),
            _ => Err(format!("Invalid sync status: {}", s)),
        }
    }
}

/// Mirror lifecycle of a note.
///
/// A remote reference only exists inside `Synced`, so a synced note without a
/// reference (or a reference on an unsynced note) cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SyncState {
    #[default]
    Pending,
    Synced {
        remote_ref: RemoteRef,
    },
    Failed {
        reason: String,
    },
}

impl SyncState {
    pub fn status(&self) -> SyncStatus {
        match self {
            SyncState::Pending => SyncStatus::Pending,
            SyncState::Synced { .. } => SyncStatus::Synced,
            SyncState::Failed { .. } => SyncStatus::Failed,
        }
    }

    pub fn remote_ref(&self) -> Option<&RemoteRef> {
        match self {
            SyncState::Synced { remote_ref } => Some(remote_ref),
            _ => None,
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        match self {
            SyncState::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// A durably stored note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub author_ref: String,
    pub author_name: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub sync: SyncState,
}

impl Note {
    /// Build a fresh, not yet mirrored note. Callers validate `text` first.
    ///
    /// `created_at` is cut to microseconds, the precision the store keeps.
    pub(crate) fn new(author: &Author, text: String) -> Self {
        Self {
            id: NoteId::new(),
            author_ref: author.author_ref.clone(),
            author_name: author.author_name.clone(),
            text,
            created_at: Utc::now().trunc_subsecs(6),
            sync: SyncState::Pending,
        }
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.sync.status()
    }

    pub fn remote_ref(&self) -> Option<&RemoteRef> {
        self.sync.remote_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.sync.last_error()
    }

    /// First eight characters of the id, for terminal output.
    pub fn short_id(&self) -> String {
        self.id.to_string()[..8].to_string()
    }
}
