//! Tracing subscriber bootstrap.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Output format of the log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Install the global subscriber. `RUST_LOG` wins over `level` when set.
///
/// Returns `false` when a subscriber was already installed, which makes
/// repeated calls harmless.
pub fn init_logging(level: &str, format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(normalize_level(level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // stderr keeps stdout clean for `--json` command output.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    match format {
        LogFormat::Text => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}

/// Map level aliases onto tracing levels. Filter directives pass through
/// untouched, since their targets are case-sensitive.
fn normalize_level(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }
    match level.to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" => "error".to_string(),
        "" => "info".to_string(),
        other => other.to_string(),
    }
}
