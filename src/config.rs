//! Process configuration.
//!
//! Built once at startup and handed to the components that need it. Nothing
//! in the core reads the environment directly.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{NotemirrorError, Result};

pub const DEFAULT_NOTION_API_BASE: &str = "https://api.notion.com";
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_MIRROR_TIMEOUT: Duration = Duration::from_secs(10);

/// Notion database the notes are mirrored into.
#[derive(Clone)]
pub struct NotionConfig {
    pub token: String,
    pub database_id: String,
    pub api_base: String,
    /// Upper bound for one page-create call, connect included.
    pub timeout: Duration,
}

impl NotionConfig {
    pub fn new(token: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            database_id: database_id.into(),
            api_base: DEFAULT_NOTION_API_BASE.to_string(),
            timeout: DEFAULT_MIRROR_TIMEOUT,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        require("notion token", &self.token)?;
        require("notion database id", &self.database_id)?;
        require("notion api base", &self.api_base)?;
        if self.timeout.is_zero() {
            return Err(NotemirrorError::Config(
                "notion timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for NotionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionConfig")
            .field("token", &"<redacted>")
            .field("database_id", &self.database_id)
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Telegram bot credentials.
#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Expected value of the `X-Telegram-Bot-Api-Secret-Token` header.
    pub webhook_secret: String,
    pub api_base: String,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            webhook_secret: webhook_secret.into(),
            api_base: DEFAULT_TELEGRAM_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn validate(&self) -> Result<()> {
        require("telegram bot token", &self.bot_token)?;
        require("telegram webhook secret", &self.webhook_secret)?;
        require("telegram api base", &self.api_base)
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("webhook_secret", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Everything `notemirror serve` needs.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub listen_addr: SocketAddr,
    pub env: String,
    pub telegram: TelegramConfig,
    pub notion: NotionConfig,
}

impl AppConfig {
    /// Reject configurations the service cannot run with.
    pub fn validate(self) -> Result<Self> {
        if self.database_path.as_os_str().is_empty() {
            return Err(NotemirrorError::Config(
                "database path must not be empty".to_string(),
            ));
        }
        self.telegram.validate()?;
        self.notion.validate()?;
        Ok(self)
    }
}

fn require(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(NotemirrorError::Config(format!("{} must not be empty", name)));
    }
    Ok(())
}
