//! Telegram implementation of the session's chat seam

use std::path::Path;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, MessageId};

use crate::session::sink::{ChatActivity, ChatSink, MediaKind, SinkError};

impl From<teloxide::RequestError> for SinkError {
    fn from(err: teloxide::RequestError) -> Self {
        SinkError::Request(err.to_string())
    }
}

/// Sends through the Bot API. Messages carry no parse mode.
#[derive(Clone)]
pub struct TelegramSink {
    bot: Bot,
}

impl TelegramSink {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatSink for TelegramSink {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageId, SinkError> {
        let msg = self.bot.send_message(chat_id, text).await?;
        Ok(msg.id)
    }

    async fn edit_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<(), SinkError> {
        self.bot.edit_message_text(chat_id, message_id, text).await?;
        Ok(())
    }

    async fn send_activity(&self, chat_id: ChatId, activity: ChatActivity) -> Result<(), SinkError> {
        let action = match activity {
            ChatActivity::Typing => ChatAction::Typing,
            ChatActivity::UploadVideo => ChatAction::UploadVideo,
            ChatActivity::UploadDocument => ChatAction::UploadDocument,
        };
        self.bot.send_chat_action(chat_id, action).await?;
        Ok(())
    }

    async fn send_media(&self, chat_id: ChatId, path: &Path, kind: MediaKind, caption: &str) -> Result<(), SinkError> {
        // Fail early with an I/O error instead of a multipart one
        fs_err::tokio::metadata(path).await?;

        let file = InputFile::file(path.to_path_buf());
        match kind {
            MediaKind::Video => {
                self.bot
                    .send_video(chat_id, file)
                    .caption(caption)
                    .supports_streaming(true)
                    .await?;
            }
            MediaKind::Document => {
                self.bot.send_document(chat_id, file).caption(caption).await?;
            }
        }
        Ok(())
    }
}
