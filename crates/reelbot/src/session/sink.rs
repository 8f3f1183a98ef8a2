//! Outbound chat seam
//!
//! The session talks to the user only through [`ChatSink`], so the whole
//! pipeline runs against an in-memory fake in tests.

use std::path::Path;

use async_trait::async_trait;
use teloxide::types::{ChatId, MessageId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("telegram request failed: {0}")]
    Request(String),

    #[error("file could not be read: {0}")]
    File(#[from] std::io::Error),
}

/// How a finished file is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Inline, streamable video (MP4 only)
    Video,
    Document,
}

impl MediaKind {
    pub fn for_path(path: &Path) -> Self {
        let is_mp4 = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("mp4"));
        if is_mp4 {
            MediaKind::Video
        } else {
            MediaKind::Document
        }
    }

    pub fn activity(self) -> ChatActivity {
        match self {
            MediaKind::Video => ChatActivity::UploadVideo,
            MediaKind::Document => ChatActivity::UploadDocument,
        }
    }
}

/// Chat action shown under the chat title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatActivity {
    Typing,
    UploadVideo,
    UploadDocument,
}

#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Sends a plain text message and returns its id
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageId, SinkError>;

    async fn edit_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<(), SinkError>;

    async fn send_activity(&self, chat_id: ChatId, activity: ChatActivity) -> Result<(), SinkError>;

    /// Uploads a file from disk with a caption
    async fn send_media(&self, chat_id: ChatId, path: &Path, kind: MediaKind, caption: &str) -> Result<(), SinkError>;
}
