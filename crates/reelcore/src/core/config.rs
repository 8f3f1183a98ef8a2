//! Runtime configuration
//!
//! Settings are read once at startup from the process environment (after
//! `.env` has been loaded by the binary) layered over an optional `reel.toml`.
//! The resulting `Settings` value is passed around explicitly; nothing here is
//! a global.

use std::path::PathBuf;
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

/// Environment variables picked up by [`Settings::figment`].
const ENV_KEYS: &[&str] = &[
    "bot_token",
    "bot_api_url",
    "ytdl_bin",
    "ffmpeg_bin",
    "temp_files_dir",
    "telegram_max_bytes",
    "download_timeout_secs",
    "merge_timeout_secs",
    "upload_timeout_secs",
    "progress_edit_interval_ms",
    "concurrent_fragments",
    "ytdl_player_clients",
    "ytdl_user_agent",
    "per_chat_policy",
    "log_file_path",
];

/// Default config file, overridable with `REEL_CONFIG`.
pub const DEFAULT_CONFIG_FILE: &str = "reel.toml";

/// Telegram refuses bot uploads above 2 GB even on a local Bot API server.
/// Keep a margin for multipart overhead.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 1_950_000_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("BOT_TOKEN environment variable not set")]
    MissingToken,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}

/// What to do when a chat sends a new link while its previous one is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PerChatPolicy {
    /// Run requests side by side
    #[default]
    Allow,
    /// Queue the new request behind the running one
    Serialize,
    /// Refuse the new request with a notice
    Reject,
}

/// Shape of the raw configuration sources.
#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(default)]
    bot_token: Option<String>,
    #[serde(default)]
    bot_api_url: Option<String>,
    #[serde(default = "default_ytdl_bin")]
    ytdl_bin: String,
    #[serde(default = "default_ffmpeg_bin")]
    ffmpeg_bin: String,
    #[serde(default = "std::env::temp_dir")]
    temp_files_dir: PathBuf,
    #[serde(default = "default_max_bytes")]
    telegram_max_bytes: u64,
    #[serde(default = "default_download_timeout")]
    download_timeout_secs: u64,
    #[serde(default = "default_merge_timeout")]
    merge_timeout_secs: u64,
    #[serde(default = "default_upload_timeout")]
    upload_timeout_secs: u64,
    #[serde(default = "default_edit_interval")]
    progress_edit_interval_ms: u64,
    #[serde(default = "default_concurrent_fragments")]
    concurrent_fragments: u32,
    #[serde(default = "default_player_clients")]
    ytdl_player_clients: String,
    #[serde(default = "default_user_agent")]
    ytdl_user_agent: String,
    #[serde(default)]
    per_chat_policy: PerChatPolicy,
    #[serde(default = "default_log_file")]
    log_file_path: PathBuf,
}

fn default_ytdl_bin() -> String {
    "yt-dlp".to_string()
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

fn default_max_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_download_timeout() -> u64 {
    1800
}

fn default_merge_timeout() -> u64 {
    600
}

fn default_upload_timeout() -> u64 {
    900
}

fn default_edit_interval() -> u64 {
    3000
}

fn default_concurrent_fragments() -> u32 {
    5
}

fn default_player_clients() -> String {
    "android,android_embedded,web_creator".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("reel.log")
}

/// Typed process configuration.
#[derive(Debug)]
pub struct Settings {
    /// Bot credential; only `run` requires it
    pub bot_token: Option<SecretString>,
    /// Custom Bot API server (a local server lifts the 50 MB upload cap)
    pub bot_api_url: Option<String>,
    /// yt-dlp binary
    pub ytdl_bin: String,
    /// ffmpeg binary
    pub ffmpeg_bin: String,
    /// Root directory for per-request scratch spaces
    pub temp_files_dir: PathBuf,
    /// Upload ceiling in bytes
    pub telegram_max_bytes: u64,
    pub download_timeout_secs: u64,
    pub merge_timeout_secs: u64,
    pub upload_timeout_secs: u64,
    /// Minimum gap between two edits of the status message
    pub progress_edit_interval_ms: u64,
    pub concurrent_fragments: u32,
    /// Comma separated `player_client` list for yt-dlp's youtube extractor
    pub ytdl_player_clients: String,
    pub ytdl_user_agent: String,
    pub per_chat_policy: PerChatPolicy,
    pub log_file_path: PathBuf,
}

impl Settings {
    /// Layered sources: `reel.toml` (or `$REEL_CONFIG`), then the environment.
    ///
    /// `BOT_TOKEN` wins over `TELOXIDE_TOKEN` when both are set.
    pub fn figment() -> Figment {
        let config_file = std::env::var("REEL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Figment::new()
            .merge(Toml::file(config_file))
            .merge(Env::raw().only(&["teloxide_token"]).map(|_| "bot_token".into()))
            .merge(Env::raw().only(ENV_KEYS))
    }

    /// Loads settings from the default sources.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// Extracts and validates settings from an arbitrary figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let raw: RawSettings = figment.extract()?;

        if raw.telegram_max_bytes == 0 {
            return Err(ConfigError::Invalid("TELEGRAM_MAX_BYTES must be positive".to_string()));
        }
        if raw.concurrent_fragments == 0 {
            return Err(ConfigError::Invalid("CONCURRENT_FRAGMENTS must be at least 1".to_string()));
        }
        if raw.ytdl_bin.trim().is_empty() || raw.ffmpeg_bin.trim().is_empty() {
            return Err(ConfigError::Invalid("YTDL_BIN and FFMPEG_BIN must not be empty".to_string()));
        }

        let bot_token = raw
            .bot_token
            .filter(|t| !t.trim().is_empty())
            .map(|t| SecretString::from(t.trim().to_string()));

        Ok(Self {
            bot_token,
            bot_api_url: raw.bot_api_url.filter(|u| !u.trim().is_empty()),
            ytdl_bin: raw.ytdl_bin,
            ffmpeg_bin: raw.ffmpeg_bin,
            temp_files_dir: raw.temp_files_dir,
            telegram_max_bytes: raw.telegram_max_bytes,
            download_timeout_secs: raw.download_timeout_secs,
            merge_timeout_secs: raw.merge_timeout_secs,
            upload_timeout_secs: raw.upload_timeout_secs,
            progress_edit_interval_ms: raw.progress_edit_interval_ms,
            concurrent_fragments: raw.concurrent_fragments,
            ytdl_player_clients: raw.ytdl_player_clients,
            ytdl_user_agent: raw.ytdl_user_agent,
            per_chat_policy: raw.per_chat_policy,
            log_file_path: raw.log_file_path,
        })
    }

    /// Returns the bot token, or an error when it is absent.
    pub fn require_token(&self) -> Result<&SecretString, ConfigError> {
        match &self.bot_token {
            Some(token) if !token.expose_secret().is_empty() => Ok(token),
            _ => Err(ConfigError::MissingToken),
        }
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn merge_timeout(&self) -> Duration {
        Duration::from_secs(self.merge_timeout_secs)
    }

    /// HTTP client timeout; uploads of ~2 GB to a local Bot API need minutes.
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn progress_edit_interval(&self) -> Duration {
        Duration::from_millis(self.progress_edit_interval_ms)
    }

    /// Player clients as a list, blanks dropped.
    pub fn player_clients(&self) -> Vec<&str> {
        self.ytdl_player_clients
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect()
    }
}
