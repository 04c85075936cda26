//! Telegram transport.
//!
//! Translates updates into engine calls and engine replies back into Bot API
//! requests. Nothing here knows about conversation states.

use roster_conversation::{
    Action, Command, ConversationEngine, Delivery, Keyboard, ParseCommandError, Reply,
};
use roster_core::OperatorId;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{
    BotCommand, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode,
};
use teloxide::{ApiError, RequestError};
use tracing::{debug, info, warn};

/// Builds the update handler tree.
pub fn schema() -> UpdateHandler<RequestError> {
    dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback))
}

/// Commands registered with the chat client's command menu.
pub fn bot_commands() -> Vec<BotCommand> {
    Command::ALL
        .into_iter()
        .map(|c| BotCommand::new(c.as_str(), c.description()))
        .collect()
}

/// Splits a leading `/command` (optionally `/command@botname`) off a message.
///
/// Returns `None` for text that is not a command.
fn parse_command(text: &str) -> Option<Result<Command, ParseCommandError>> {
    let word = text.split_whitespace().next()?;
    if !word.starts_with('/') {
        return None;
    }
    let name = word.split('@').next().unwrap_or(word);
    Some(name.parse())
}

async fn on_message(
    bot: Bot,
    msg: Message,
    engine: Arc<ConversationEngine>,
) -> ResponseResult<()> {
    let (Some(text), Some(user)) = (msg.text(), msg.from.as_ref()) else {
        return Ok(());
    };
    let operator = OperatorId::new(user.id.0);

    let reply = match parse_command(text) {
        Some(Ok(command)) => {
            info!(operator = %operator, command = %command, "command received");
            engine.handle_command(operator, command).await
        }
        Some(Err(e)) => {
            debug!(operator = %operator, error = %e, "unknown command");
            ConversationEngine::menu_prompt()
        }
        None => engine.handle_text(operator, text).await,
    };

    deliver(&bot, msg.chat.id, None, reply).await
}

async fn on_callback(
    bot: Bot,
    query: CallbackQuery,
    engine: Arc<ConversationEngine>,
) -> ResponseResult<()> {
    bot.answer_callback_query(query.id.clone()).await?;

    let Some(payload) = query.data.as_deref() else {
        return Ok(());
    };
    let action = match payload.parse::<Action>() {
        Ok(action) => action,
        Err(e) => {
            warn!(error = %e, "ignoring button");
            return Ok(());
        }
    };

    let operator = OperatorId::new(query.from.id.0);
    info!(operator = %operator, action = %action, "button pressed");
    let reply = engine.handle_action(operator, action).await;

    let (chat, pressed) = match query.message.as_ref() {
        Some(message) => (message.chat().id, Some(message.id())),
        None => (ChatId::from(query.from.id), None),
    };
    deliver(&bot, chat, pressed, reply).await
}

/// Sends or edits according to the reply's delivery.
///
/// An edit falls back to a new message when the pressed message is unknown.
async fn deliver(
    bot: &Bot,
    chat: ChatId,
    pressed: Option<MessageId>,
    reply: Reply,
) -> ResponseResult<()> {
    let markup = reply.keyboard.as_ref().map(inline_keyboard);

    if let (Delivery::Edit, Some(message_id)) = (reply.delivery, pressed) {
        let mut request = bot
            .edit_message_text(chat, message_id, reply.text)
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup {
            request = request.reply_markup(markup);
        }
        return match request.await {
            Ok(_) => Ok(()),
            Err(RequestError::Api(ApiError::MessageNotModified)) => {
                debug!("message unchanged");
                Ok(())
            }
            Err(e) => Err(e),
        };
    }

    let mut request = bot
        .send_message(chat, reply.text)
        .parse_mode(ParseMode::Html);
    if let Some(markup) = markup {
        request = request.reply_markup(markup);
    }
    request.await?;
    Ok(())
}

fn inline_keyboard(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|button| InlineKeyboardButton::callback(button.label.clone(), button.action.as_str()))
            .collect::<Vec<_>>()
    }))
}
