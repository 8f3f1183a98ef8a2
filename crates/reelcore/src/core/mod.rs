//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod logging;
pub mod process;
pub mod utils;

pub use config::{ConfigError, PerChatPolicy, Settings};
pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_tool_configuration};
