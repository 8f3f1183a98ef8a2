//! Dispatcher schema and handler chain builders

use std::sync::Arc;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;
use teloxide::utils::command::BotCommands;

use super::bot::Command;
use crate::session::messages::welcome_text;
use crate::session::{handle_text, Admission, SessionContext};

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub session: Arc<SessionContext>,
}

impl HandlerDeps {
    pub fn new(session: Arc<SessionContext>) -> Self {
        Self { session }
    }
}

/// Creates the dispatcher schema.
///
/// Commands are answered in private chats only; every text message goes to
/// the session layer, which drops anything not from a private chat.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_messages = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(message_handler(deps_messages))
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private())
        .branch(dptree::entry().filter_command::<Command>().endpoint(
            move |bot: Bot, msg: Message, cmd: Command| {
                let deps = deps.clone();
                async move {
                    log::info!("Received command {:?} from chat {}", cmd, msg.chat.id);

                    let welcome = welcome_text(deps.session.max_upload_bytes);
                    let text = match cmd {
                        Command::Start => welcome,
                        Command::Help => format!("{}\n\n{}", welcome, Command::descriptions()),
                    };
                    bot.send_message(msg.chat.id, text).await?;
                    Ok::<(), HandlerError>(())
                }
            },
        ))
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter_map(|msg: Message| msg.text().map(str::to_owned))
        .endpoint(move |msg: Message, text: String| {
            let deps = deps.clone();
            async move {
                let admission = handle_text(&deps.session, msg.chat.id, msg.chat.is_private(), &text).await;
                if admission != Admission::Ignored {
                    log::debug!("Message from chat {}: {:?}", msg.chat.id, admission);
                }
                Ok::<(), HandlerError>(())
            }
        })
}
