//! reelcore - download engine for the reel Telegram bot
//!
//! Everything here is chat-agnostic: link validation, yt-dlp retrieval with
//! progress parsing, ffmpeg muxing, the upload size guard and request-scoped
//! scratch spaces. The Telegram side lives in the `reelbot` crate.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, process helpers, utilities
//! - `download`: link validation, retrieval, merging, size guard, scratch space

pub mod core;
pub mod download;

pub use core::config::{PerChatPolicy, Settings};
pub use core::error::{AppError, AppResult};
pub use download::error::{DownloadError, FailureCategory};
