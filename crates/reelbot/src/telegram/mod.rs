//! Telegram front end: bot setup, dispatcher schema and the chat sink.

pub mod bot;
pub mod handlers;
pub mod sink;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use sink::TelegramSink;
