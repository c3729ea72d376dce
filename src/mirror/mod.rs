//! Remote mirror of stored notes.
//!
//! A mirror client owns no state and never touches the local store; it turns
//! one note into one remote document and reports the remote reference.

mod notion;

pub use notion::NotionClient;

use std::future::Future;

use thiserror::Error;

use crate::entity::{Note, RemoteRef};

/// Errors emitted by mirror clients.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MirrorError {
    /// Transport failure, timeout, or a non-2xx answer that says nothing
    /// about the payload itself. Worth retrying later.
    #[error("mirror unavailable: {0}")]
    Unavailable(String),

    /// The service refused the payload. Retrying the same note will not help.
    #[error("mirror rejected note ({status}): {message}")]
    Rejected {
        /// HTTP status code returned by the service.
        status: u16,
        /// Error message from the response body.
        message: String,
    },
}

impl MirrorError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, MirrorError::Unavailable(_))
    }
}

impl From<reqwest::Error> for MirrorError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Unavailable(format!("request timed out: {}", value))
        } else {
            Self::Unavailable(value.to_string())
        }
    }
}

/// Pushes a note to an external document service.
pub trait MirrorClient: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Create the remote copy of `note` and return its reference.
    ///
    /// Must only be called for notes that are already durably stored.
    fn push(&self, note: &Note) -> impl Future<Output = Result<RemoteRef, MirrorError>> + Send;
}
