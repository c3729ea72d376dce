//! Webhook error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Errors answered to the chat platform instead of processing an update.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// Secret token header missing or wrong.
    #[error("invalid secret token")]
    AccessDenied,

    /// Body is not a Telegram update.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl WebhookError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
