//! reelbot - Telegram front end for reel
//!
//! # Module Structure
//!
//! - `session`: chat-agnostic request handling (state machine, status message, policy)
//! - `telegram`: teloxide bot, dispatcher schema and the Telegram chat sink
//! - `cli`: command line interface

pub mod cli;
pub mod session;
pub mod telegram;
