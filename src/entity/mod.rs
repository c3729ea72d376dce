mod note;

pub use note::{Note, NoteId, RemoteRef, SyncState, SyncStatus};

use serde::{Deserialize, Serialize};

/// The chat user a note belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Opaque user identifier from the chat platform.
    pub author_ref: String,
    /// Display handle, when the platform supplies one.
    pub author_name: Option<String>,
}

impl Author {
    pub fn new(author_ref: impl Into<String>) -> Self {
        Self {
            author_ref: author_ref.into(),
            author_name: None,
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.author_name = name;
        self
    }
}

/// Normalized inbound request, extracted by the ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRequest {
    pub author: Author,
    pub raw_text: String,
}

impl NoteRequest {
    pub fn new(author: Author, raw_text: impl Into<String>) -> Self {
        Self {
            author,
            raw_text: raw_text.into(),
        }
    }
}
