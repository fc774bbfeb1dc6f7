//! Configuration file parser for ~/.config/feedhook/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as warnings, since they are
//! usually typos. Command-line flags override anything set here.

use chrono::{DateTime, NaiveDateTime, Utc};
use secrecy::SecretString;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large (max {max} bytes)")]
    TooLarge { max: u64 },

    #[error("Not a valid date: {0:?} (expected yyyy-mm-dd HH:MM, UTC)")]
    InvalidSince(String),

    #[error("Invalid .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
}

/// Load a `.env` file into the process environment.
///
/// `None` searches the working directory and its parents. Variables that are
/// already set keep their value. A missing file is not an error; the path
/// that was loaded is returned.
pub fn load_dotenv(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };
    match loaded {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Format of the `--since` cutoff.
pub const SINCE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Parse a `yyyy-mm-dd HH:MM` cutoff, interpreted as UTC.
pub fn parse_since(s: &str) -> Result<DateTime<Utc>, ConfigError> {
    NaiveDateTime::parse_from_str(s.trim(), SINCE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| ConfigError::InvalidSince(s.to_string()))
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
///
/// Custom Debug impl masks `webhook_url`: the URL carries the webhook token.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Discord webhook URL (alternative to `--webhook` / `DISCORD_WEBHOOK`).
    pub webhook_url: Option<SecretString>,

    /// Pause between the end of one poll cycle and the start of the next.
    pub poll_interval_secs: u64,

    /// Redraw period of the live status table.
    pub render_interval_ms: u64,

    /// Maximum feeds checked at the same time. 0 = all feeds at once.
    pub max_concurrent_checks: usize,

    /// Per-request timeout for feed fetches.
    pub fetch_timeout_secs: u64,

    /// Per-request timeout for webhook posts.
    pub webhook_timeout_secs: u64,

    /// Append logs to this file in addition to the console.
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webhook_url: None,
            poll_interval_secs: 10,
            render_interval_ms: 250,
            max_concurrent_checks: 0,
            fetch_timeout_secs: 30,
            webhook_timeout_secs: 15,
            log_file: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field(
                "webhook_url",
                &self.webhook_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("render_interval_ms", &self.render_interval_ms)
            .field("max_concurrent_checks", &self.max_concurrent_checks)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("webhook_timeout_secs", &self.webhook_timeout_secs)
            .field("log_file", &self.log_file)
            .finish()
    }
}

/// Maximum config file size (1 MB).
const MAX_FILE_SIZE: u64 = 1_048_576;

const KNOWN_KEYS: [&str; 7] = [
    "webhook_url",
    "poll_interval_secs",
    "render_interval_ms",
    "max_concurrent_checks",
    "fetch_timeout_secs",
    "webhook_timeout_secs",
    "log_file",
];

/// Read at most `MAX_FILE_SIZE` bytes. `None` if the file does not exist.
fn read_capped(path: &Path) -> Result<Option<String>, ConfigError> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut content = String::new();
    file.take(MAX_FILE_SIZE + 1).read_to_string(&mut content)?;
    if content.len() as u64 > MAX_FILE_SIZE {
        return Err(ConfigError::TooLarge { max: MAX_FILE_SIZE });
    }
    Ok(Some(content))
}

impl Config {
    /// Default location: `$HOME/.config/feedhook/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(PathBuf::from(home).join(".config/feedhook/config.toml"))
    }

    /// Load configuration from a TOML file.
    ///
    /// A missing or blank file gives the defaults. Unknown keys are logged
    /// and ignored; a wrong value type is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let Some(content) = read_capped(path)? else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let table: toml::Table = toml::from_str(&content)?;
        let unknown: Vec<&str> = table
            .keys()
            .map(String::as_str)
            .filter(|key| !KNOWN_KEYS.contains(key))
            .collect();
        if !unknown.is_empty() {
            tracing::warn!(path = %path.display(), keys = ?unknown, "Ignoring unknown config keys");
        }

        let config: Config = toml::Value::Table(table).try_into()?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Never shorter than 1s.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Never shorter than 50ms.
    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms.max(50))
    }

    /// Never shorter than 1s.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    /// Never shorter than 1s.
    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs.max(1))
    }
}

// ============================================================================
// Tests
// ============================================================================
