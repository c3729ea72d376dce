//! HTTP ingestion endpoint.
//!
//! - `POST /webhook` receives Telegram updates, turns `/note <text>` into a
//!   [`NoteRequest`] and answers the chat with the rendered outcome.
//! - `GET /health` reports liveness.
//!
//! The endpoint only extracts and renders; storage and mirroring belong to
//! the [`SyncOrchestrator`].

mod error;
pub mod telegram;

pub use error::WebhookError;
pub use telegram::{parse_note_command, ReplySender, TelegramReplier, Update};

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::entity::{Author, NoteRequest};
use crate::mirror::MirrorClient;
use crate::store::NoteStore;
use crate::sync::SyncOrchestrator;

pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";
pub const UNEXPECTED_ERROR_REPLY: &str = "An unexpected error occurred. Please try again.";

/// Telegram updates are small; anything larger is not one.
const MAX_UPDATE_BYTES: usize = 1024 * 1024;

/// Shared state of the webhook handlers.
pub struct AppState<S, M, R> {
    pub orchestrator: SyncOrchestrator<S, M>,
    pub replier: Arc<R>,
    webhook_secret: Arc<str>,
}

impl<S, M, R> Clone for AppState<S, M, R> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
            replier: Arc::clone(&self.replier),
            webhook_secret: Arc::clone(&self.webhook_secret),
        }
    }
}

impl<S: NoteStore, M: MirrorClient, R: ReplySender> AppState<S, M, R> {
    pub fn new(
        orchestrator: SyncOrchestrator<S, M>,
        replier: Arc<R>,
        webhook_secret: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            orchestrator,
            replier,
            webhook_secret: webhook_secret.into(),
        }
    }

    fn secret_matches(&self, headers: &HeaderMap) -> bool {
        headers
            .get(SECRET_TOKEN_HEADER)
            .map(|v| v.as_bytes().ct_eq(self.webhook_secret.as_bytes()).into())
            .unwrap_or(false)
    }
}

/// Build the HTTP router.
pub fn router<S: NoteStore, M: MirrorClient, R: ReplySender>(state: AppState<S, M, R>) -> Router {
    Router::new()
        .route("/webhook", post(receive_update::<S, M, R>))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPDATE_BYTES))
        .with_state(state)
}

/// Serve `router` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "webhook listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

fn ack() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn receive_update<S: NoteStore, M: MirrorClient, R: ReplySender>(
    State(state): State<AppState<S, M, R>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    if !state.secret_matches(&headers) {
        warn!("webhook request with invalid secret token");
        return Err(WebhookError::AccessDenied);
    }

    let update: Update = serde_json::from_slice(&body).map_err(|e| {
        error!(error = %e, "failed to parse webhook payload");
        WebhookError::InvalidPayload(e.to_string())
    })?;
    debug!(update_id = update.update_id, "update received");

    let Some(message) = update.message else {
        return Ok(ack());
    };
    let Some(argument) = message.text.as_deref().and_then(parse_note_command) else {
        return Ok(ack());
    };

    // Channel posts carry no sender; the chat stands in for the author.
    let author = match message.from {
        Some(user) => Author::new(user.id.to_string()).with_name(user.username),
        None => Author::new(message.chat.id.to_string()),
    };
    let request = NoteRequest::new(author, argument);

    let reply = match state.orchestrator.handle_note_request(&request).await {
        Ok(outcome) => {
            debug!(chat_id = message.chat.id, %outcome, "note command handled");
            outcome.user_message()
        }
        Err(e) => {
            error!(chat_id = message.chat.id, error = %e, "note command failed");
            UNEXPECTED_ERROR_REPLY
        }
    };

    state.replier.send_reply(message.chat.id, reply).await;
    Ok(ack())
}
