//! Logging initialization and configuration checking
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Startup diagnostics for the external tools and limits

use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;
use crate::core::utils::human_size;

/// Initialize logger for both console and file output
///
/// `log` records (ours and teloxide's) are bridged into the tracing
/// subscriber, so spans opened around a session tag every line inside it.
/// The level comes from `RUST_LOG`, defaulting to `info`.
///
/// # Arguments
/// * `log_file_path` - Path to the log file (appended to, created if missing)
pub fn init_logger(log_file_path: &Path) -> Result<()> {
    let log_file = fs_err::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .map_err(|e| anyhow::anyhow!("Failed to open log file: {}", e))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(log_file)))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective tool configuration at application startup
pub fn log_tool_configuration(settings: &Settings) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🎬 reel configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("yt-dlp binary: {}", settings.ytdl_bin);
    log::info!("ffmpeg binary: {}", settings.ffmpeg_bin);
    log::info!("Scratch root: {}", settings.temp_files_dir.display());
    log::info!(
        "Upload limit: {} ({} bytes)",
        human_size(settings.telegram_max_bytes),
        settings.telegram_max_bytes
    );
    log::info!(
        "Timeouts: download {}s, merge {}s, upload {}s",
        settings.download_timeout_secs,
        settings.merge_timeout_secs,
        settings.upload_timeout_secs
    );
    log::info!("Per-chat policy: {}", settings.per_chat_policy);

    match &settings.bot_api_url {
        Some(url) => log::info!("Bot API: {}", url),
        None => {
            if settings.telegram_max_bytes > 50 * 1024 * 1024 {
                log::warn!("⚠️  Using the public Bot API: uploads above 50 MB will be rejected by Telegram");
                log::warn!("   Set BOT_API_URL to a local telegram-bot-api server to send files up to 2 GB");
            }
        }
    }
}
