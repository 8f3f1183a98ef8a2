//! Bot initialization
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation (custom Bot API server, HTTP timeout)
//! - Command registration in the Telegram UI

use reqwest::ClientBuilder;
use reelcore::Settings;
use secrecy::ExposeSecret;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Send me a YouTube link. Commands:")]
pub enum Command {
    #[command(description = "how to use the bot")]
    Start,
    #[command(description = "show this help")]
    Help,
}

/// Creates a Bot instance with custom or default API URL
///
/// The HTTP client timeout is the upload timeout: sending a ~2 GB file to a
/// local Bot API server takes minutes, and it also has to outlast the 60 s
/// long-poll.
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Missing token, invalid BOT_API_URL or client build failure
pub fn create_bot(settings: &Settings) -> anyhow::Result<Bot> {
    let token = settings.require_token()?;
    let client = ClientBuilder::new().timeout(settings.upload_timeout()).build()?;
    let bot = Bot::with_client(token.expose_secret(), client);

    match &settings.bot_api_url {
        Some(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            let url = url::Url::parse(bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
            Ok(bot.set_api_url(url))
        }
        None => Ok(bot),
    }
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}
