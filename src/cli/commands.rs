use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::{
    NotionConfig, TelegramConfig, DEFAULT_NOTION_API_BASE, DEFAULT_TELEGRAM_API_BASE,
};
use crate::logging::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "notemirror")]
#[command(version, about = "Save chat notes locally and mirror them to Notion")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the SQLite note database
    #[arg(long, global = true, env = "DATABASE_PATH", default_value = "notes.db")]
    pub database: PathBuf,

    /// Log level or filter directive (RUST_LOG takes precedence)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, global = true, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the webhook server
    Serve(ServeArgs),

    /// Retry mirroring of failed notes
    Retry {
        /// Retry only this note (full id); otherwise sweep all failed notes
        id: Option<String>,

        /// Maximum number of failed notes to retry in one sweep
        #[arg(long, default_value_t = 100)]
        limit: usize,

        #[command(flatten)]
        notion: NotionArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored notes, oldest first
    List {
        /// Only notes with this sync status (pending, synced, failed)
        #[arg(long)]
        status: Option<String>,

        /// Maximum number of notes to show
        #[arg(long, default_value_t = 50)]
        limit: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a single note
    Get {
        /// Note id
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address the webhook server binds to
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    /// Deployment environment name, reported in logs
    #[arg(long = "app-env", env = "APP_ENV", default_value = "development")]
    pub app_env: String,

    #[command(flatten)]
    pub telegram: TelegramArgs,

    #[command(flatten)]
    pub notion: NotionArgs,
}

#[derive(Args, Debug)]
pub struct TelegramArgs {
    /// Telegram Bot API token
    #[arg(long = "telegram-bot-token", env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub bot_token: String,

    /// Secret Telegram sends in X-Telegram-Bot-Api-Secret-Token
    #[arg(
        long = "telegram-webhook-secret",
        env = "TELEGRAM_WEBHOOK_SECRET",
        hide_env_values = true
    )]
    pub webhook_secret: String,

    /// Telegram Bot API base URL
    #[arg(long = "telegram-api-base", env = "TELEGRAM_API_BASE", default_value = DEFAULT_TELEGRAM_API_BASE)]
    pub telegram_api_base: String,
}

impl TelegramArgs {
    pub fn into_config(self) -> TelegramConfig {
        TelegramConfig::new(self.bot_token, self.webhook_secret)
            .with_api_base(self.telegram_api_base)
    }
}

#[derive(Args, Debug)]
pub struct NotionArgs {
    /// Notion integration token
    #[arg(long = "notion-token", env = "NOTION_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Notion database receiving the pages
    #[arg(long = "notion-database-id", env = "NOTION_DATABASE_ID")]
    pub database_id: String,

    /// Notion API base URL
    #[arg(long = "notion-api-base", env = "NOTION_API_BASE", default_value = DEFAULT_NOTION_API_BASE)]
    pub notion_api_base: String,

    /// Timeout for one mirror call, in seconds
    #[arg(long = "notion-timeout-secs", env = "NOTION_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,
}

impl NotionArgs {
    pub fn into_config(self) -> NotionConfig {
        NotionConfig::new(self.token, self.database_id)
            .with_api_base(self.notion_api_base)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}
