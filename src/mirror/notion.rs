use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{MirrorClient, MirrorError};
use crate::config::NotionConfig;
use crate::entity::{Note, RemoteRef};
use crate::error::{NotemirrorError, Result};

pub const NOTION_API_VERSION: &str = "2022-06-28";

/// Notion caps a single rich-text element at this many characters.
const MAX_TITLE_CHARS: usize = 2000;

/// Mirrors notes as pages of a Notion database.
///
/// Page properties: `Name` (title) holds the text, `Author` (rich text) the
/// author reference and `Created` (date) the creation timestamp.
#[derive(Debug, Clone)]
pub struct NotionClient {
    http: reqwest::Client,
    config: NotionConfig,
}

#[derive(Deserialize)]
struct PageCreated {
    id: String,
}

#[derive(Deserialize)]
struct NotionErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl NotionClient {
    pub fn new(config: NotionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotemirrorError::Config(format!("notion http client: {}", e)))?;

        Ok(Self { http, config })
    }

    fn pages_url(&self) -> String {
        format!("{}/v1/pages", self.config.api_base.trim_end_matches('/'))
    }

    fn page_payload(&self, note: &Note) -> Value {
        let title: String = note.text.chars().take(MAX_TITLE_CHARS).collect();

        json!({
            "parent": { "database_id": self.config.database_id },
            "properties": {
                "Name": {
                    "title": [{ "text": { "content": title } }]
                },
                "Author": {
                    "rich_text": [{ "text": { "content": note.author_ref } }]
                },
                "Created": {
                    "date": { "start": note.created_at.to_rfc3339() }
                }
            }
        })
    }
}

/// Map a non-2xx answer to a mirror error. Payload validation failures are
/// final; everything else is treated as the service being unavailable.
fn classify_failure(status: StatusCode, body: &str) -> MirrorError {
    let parsed = serde_json::from_str::<NotionErrorBody>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| body.chars().take(200).collect());
    let validation = parsed
        .as_ref()
        .and_then(|b| b.code.as_deref())
        .is_some_and(|code| code == "validation_error");

    if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY || validation
    {
        MirrorError::Rejected {
            status: status.as_u16(),
            message,
        }
    } else {
        MirrorError::Unavailable(format!("notion answered {}: {}", status.as_u16(), message))
    }
}

impl MirrorClient for NotionClient {
    fn name(&self) -> &'static str {
        "notion"
    }

    async fn push(&self, note: &Note) -> std::result::Result<RemoteRef, MirrorError> {
        debug!(note_id = %note.id, "creating notion page");

        let response = self
            .http
            .post(self.pages_url())
            .bearer_auth(&self.config.token)
            .header("Notion-Version", NOTION_API_VERSION)
            .json(&self.page_payload(note))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let page: PageCreated = response
            .json()
            .await
            .map_err(|e| MirrorError::Unavailable(format!("unreadable notion response: {}", e)))?;

        info!(note_id = %note.id, page_id = %page.id, "notion page created");
        Ok(RemoteRef::new(page.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Author;
    use crate::testing::spawn_upstream;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn note(text: &str) -> Note {
        Note::new(&Author::new("u1"), text.to_string())
    }

    fn client(base: &str) -> NotionClient {
        NotionClient::new(
            NotionConfig::new("secret_token", "db-42")
                .with_api_base(base)
                .with_timeout(Duration::from_millis(500)),
        )
        .unwrap()
    }

    #[test]
    fn test_payload_maps_note_fields() {
        let client = client("http://localhost");
        let note = note("Buy milk");
        let payload = client.page_payload(&note);

        assert_eq!(payload["parent"]["database_id"], "db-42");
        assert_eq!(
            payload["properties"]["Name"]["title"][0]["text"]["content"],
            "Buy milk"
        );
        assert_eq!(
            payload["properties"]["Author"]["rich_text"][0]["text"]["content"],
            "u1"
        );
        assert_eq!(
            payload["properties"]["Created"]["date"]["start"],
            note.created_at.to_rfc3339()
        );
    }

    #[test]
    fn test_payload_truncates_long_titles() {
        let client = client("http://localhost");
        let payload = client.page_payload(&note(&"é".repeat(2500)));
        let title = payload["properties"]["Name"]["title"][0]["text"]["content"]
            .as_str()
            .unwrap();
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_classify_failure() {
        let rejected = classify_failure(
            StatusCode::BAD_REQUEST,
            r#"{"object":"error","status":400,"code":"validation_error","message":"Name is not a property"}"#,
        );
        assert_eq!(
            rejected,
            MirrorError::Rejected {
                status: 400,
                message: "Name is not a property".to_string()
            }
        );
        assert!(!rejected.is_retryable());

        let unavailable = classify_failure(StatusCode::SERVICE_UNAVAILABLE, "upstream down");
        assert!(unavailable.is_retryable());
        assert!(unavailable.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_push_returns_page_id() {
        let seen: Arc<Mutex<Option<(HeaderMap, serde_json::Value)>>> = Arc::default();
        let captured = Arc::clone(&seen);
        let router = Router::new().route(
            "/v1/pages",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let captured = Arc::clone(&captured);
                async move {
                    *captured.lock().unwrap() = Some((headers, body));
                    Json(serde_json::json!({ "object": "page", "id": "page-123" }))
                }
            }),
        );
        let base = spawn_upstream(router).await;

        let remote = client(&base).push(&note("Buy milk")).await.unwrap();
        assert_eq!(remote.as_str(), "page-123");

        let (headers, body) = seen.lock().unwrap().take().unwrap();
        assert_eq!(headers["authorization"], "Bearer secret_token");
        assert_eq!(headers["notion-version"], NOTION_API_VERSION);
        assert_eq!(body["parent"]["database_id"], "db-42");
    }

    #[tokio::test]
    async fn test_push_maps_validation_error_to_rejected() {
        let router = Router::new().route(
            "/v1/pages",
            post(|| async {
                (
                    AxumStatus::BAD_REQUEST,
                    Json(serde_json::json!({
                        "object": "error",
                        "status": 400,
                        "code": "validation_error",
                        "message": "body failed validation"
                    })),
                )
            }),
        );
        let base = spawn_upstream(router).await;

        let err = client(&base).push(&note("Buy milk")).await.unwrap_err();
        assert!(matches!(err, MirrorError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_push_maps_server_error_to_unavailable() {
        let router = Router::new().route(
            "/v1/pages",
            post(|| async { (AxumStatus::BAD_GATEWAY, "bad gateway") }),
        );
        let base = spawn_upstream(router).await;

        let err = client(&base).push(&note("Buy milk")).await.unwrap_err();
        assert!(matches!(err, MirrorError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_push_without_page_id_is_unavailable() {
        let router = Router::new().route(
            "/v1/pages",
            post(|| async { Json(serde_json::json!({ "object": "page" })) }),
        );
        let base = spawn_upstream(router).await;

        let err = client(&base).push(&note("Buy milk")).await.unwrap_err();
        assert!(matches!(err, MirrorError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_push_times_out_as_unavailable() {
        let router = Router::new().route(
            "/v1/pages",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(serde_json::json!({ "id": "too-late" }))
            }),
        );
        let base = spawn_upstream(router).await;

        let err = client(&base).push(&note("Buy milk")).await.unwrap_err();
        assert!(matches!(err, MirrorError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_push_to_closed_port_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{}", addr))
            .push(&note("Buy milk"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
