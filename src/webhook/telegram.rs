//! Telegram update shapes, `/note` command extraction and chat replies.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use crate::config::TelegramConfig;
use crate::error::{NotemirrorError, Result};

const NOTE_COMMAND: &str = "/note";
const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// The subset of a Telegram `Update` this service reads.
#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

/// Argument of a `/note` command, or `None` for any other text.
///
/// Accepts the addressed form `/note@SomeBot` used in group chats.
pub fn parse_note_command(text: &str) -> Option<&str> {
    let text = text.trim_start();
    let (command, rest) = match text.find(char::is_whitespace) {
        Some(idx) => text.split_at(idx),
        None => (text, ""),
    };

    let is_note = command == NOTE_COMMAND
        || command
            .strip_prefix(NOTE_COMMAND)
            .is_some_and(|suffix| suffix.starts_with('@'));

    is_note.then(|| rest.trim())
}

/// Delivers a reply to a chat. Failures are logged, not returned: the note
/// outcome is already decided when the reply goes out.
pub trait ReplySender: Send + Sync + 'static {
    fn send_reply(&self, chat_id: i64, text: &str) -> impl Future<Output = ()> + Send;
}

/// Sends replies through the Bot API `sendMessage` method.
#[derive(Debug, Clone)]
pub struct TelegramReplier {
    http: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramReplier {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| NotemirrorError::Config(format!("telegram http client: {}", e)))?;
        Ok(Self { http, config })
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token
        )
    }
}

impl ReplySender for TelegramReplier {
    async fn send_reply(&self, chat_id: i64, text: &str) {
        let result = self
            .http
            .post(self.send_message_url())
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(_) => debug!(chat_id, "reply sent"),
            // without_url keeps the bot token out of the log line
            Err(e) => error!(chat_id, error = %e.without_url(), "failed to send reply"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spawn_upstream;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_parse_note_command() {
        assert_eq!(parse_note_command("/note Buy milk"), Some("Buy milk"));
        assert_eq!(parse_note_command("/note@NotesBot  Buy milk "), Some("Buy milk"));
        assert_eq!(parse_note_command("/note"), Some(""));
        assert_eq!(parse_note_command("/note    "), Some(""));
        assert_eq!(parse_note_command("/note\nline one\nline two"), Some("line one\nline two"));
        assert_eq!(parse_note_command("/notes list"), None);
        assert_eq!(parse_note_command("/start"), None);
        assert_eq!(parse_note_command("hello /note"), None);
    }

    #[test]
    fn test_update_without_message_parses() {
        let update: Update = serde_json::from_str(r#"{"update_id": 1}"#).unwrap();
        assert!(update.message.is_none());
    }

    #[tokio::test]
    async fn test_replier_posts_send_message() {
        let seen: Arc<Mutex<Vec<serde_json::Value>>> = Arc::default();
        let captured = Arc::clone(&seen);
        let router = Router::new().route(
            "/botbot-token/sendMessage",
            post(move |Json(body): Json<serde_json::Value>| {
                let captured = Arc::clone(&captured);
                async move {
                    captured.lock().unwrap().push(body);
                    Json(serde_json::json!({ "ok": true }))
                }
            }),
        );
        let base = spawn_upstream(router).await;

        let replier =
            TelegramReplier::new(TelegramConfig::new("bot-token", "secret").with_api_base(base))
                .unwrap();
        replier.send_reply(42, "Note saved and synced.").await;

        let bodies = seen.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["chat_id"], 42);
        assert_eq!(bodies[0]["text"], "Note saved and synced.");
    }

    #[tokio::test]
    async fn test_replier_swallows_failures() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let replier = TelegramReplier::new(
            TelegramConfig::new("bot-token", "secret").with_api_base(format!("http://{}", addr)),
        )
        .unwrap();
        replier.send_reply(42, "hello").await;
    }
}
