pub mod admin;
pub mod callbacks;
pub mod views;

use std::sync::Arc;

use bot_commons::useful_methods::*;
use teloxide::{
    payloads::{EditMessageTextSetters, SendMessageSetters},
    requests::Requester,
    types::{BotCommand, ChatId, InlineKeyboardMarkup, Me, Message, MessageId, ParseMode, User},
    ApiError, Bot, RequestError,
};

pub use self::callbacks::handle_callback_query;
use crate::{config::Config, database::Database, evaluator, intake::AdminIntake};

/// Where a response goes: a new message, or over an existing one of the bot's.
#[derive(Debug, Clone, Copy)]
pub enum Place {
    New(ChatId),
    Edit(ChatId, MessageId),
}

/// Send or edit in a message with HTML formatting.
pub async fn send_or_edit(
    bot: &Bot,
    place: Place,
    text: String,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<(), RequestError> {
    match place {
        Place::New(chat) => {
            let request = bot.send_message(chat, text).parse_mode(ParseMode::Html);
            match keyboard {
                Some(keyboard) => request.reply_markup(keyboard).await?,
                None => request.await?,
            };
        }
        Place::Edit(chat, message) => {
            let keyboard = keyboard.unwrap_or_default();
            let result = bot
                .edit_message_text(chat, message, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await;

            // Pressing "check again" with nothing changed lands here. That's fine.
            if let Err(RequestError::Api(ApiError::MessageNotModified)) = result {
                return Ok(());
            }
            result?;
        }
    }
    Ok(())
}

/// Remember the user and when they were last seen. Failing that is not fatal.
pub async fn touch_user(database: &Database, user: &User) {
    if let Err(e) = database
        .touch_user(user.id, user.username.as_deref(), &user.full_name())
        .await
    {
        log::warn!("Failed to remember user {}: {e}", user.pretty_name(true));
    }
}

/// Check the user's subscriptions and show them the result.
pub async fn run_gate(
    bot: &Bot,
    database: &Database,
    config: &Config,
    user: &User,
    place: Place,
) -> Result<(), RequestError> {
    if let Err(e) = database.count_check(user.id).await {
        log::warn!("Failed to count a check of {}: {e}", user.pretty_name(true));
    }

    let timeout = config.lookup_timeout;
    let evaluation = match evaluator::evaluate(database, bot, user.id, timeout).await {
        Ok(x) => x,
        Err(e) => {
            log::error!("Failed to check subscriptions of {}: {e}", user.pretty_name(true));
            return send_or_edit(bot, place, views::GENERIC_ERROR.to_string(), None).await;
        }
    };

    let referral = if evaluation.all_subscribed() {
        log::info!("{} passed the gate", user.pretty_name(true));
        database.first_referral_channel().await.unwrap_or_else(|e| {
            log::error!("Failed to get the referral channel: {e}");
            None
        })
    } else {
        None
    };

    let view = views::gate(&evaluation, referral.as_ref());
    send_or_edit(bot, place, view.text, Some(view.keyboard)).await
}

pub fn generate_bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Get access"),
        BotCommand::new("check", "Check your subscriptions again"),
        BotCommand::new("stats", "Bot statistics"),
        BotCommand::new("help", "What this bot does"),
    ]
}

/// Returns `true` if a command was parsed and responded to.
async fn handle_command(
    bot: &Bot,
    me: &Me,
    message: &Message,
    user: &User,
    database: &Database,
    config: &Config,
    intake: &AdminIntake,
) -> Result<bool, RequestError> {
    // Get text of the message.
    let Some(text) = message.text_full() else {
        return Ok(false);
    };
    // Check if it starts with "/", like how a command should.
    if !text.starts_with('/') {
        return Ok(false);
    }
    // Get first word in the message, the command itself.
    let Some(command) = text.split_whitespace().next() else {
        return Ok(false);
    };

    // Trim the bot's username from the command and convert to lowercase.
    let username = format!("@{}", me.username());
    let command = command.trim_end_matches(username.as_str()).to_lowercase();

    let chat = message.chat.id;
    let place = Place::New(chat);

    match command.as_str() {
        "/start" | "/check" => run_gate(bot, database, config, user, place).await?,
        "/stats" => {
            let record = database.get_user(user.id).await.unwrap_or_else(|e| {
                log::warn!("Failed to get user {}: {e}", user.pretty_name(true));
                None
            });
            let text = match database.counts().await {
                Ok(counts) => views::stats(&counts, record.as_ref()),
                Err(e) => {
                    log::error!("Failed to count things for stats: {e}");
                    views::GENERIC_ERROR.to_string()
                }
            };
            send_or_edit(bot, place, text, None).await?;
        }
        "/admin" => {
            if !config.is_admin(user.id) {
                log::info!("Non-admin {} asked for the admin panel", user.pretty_name(true));
                bot.send_message(chat, views::ACCESS_DENIED).await?;
            } else {
                let state = intake.state(user.id).await;
                admin::show_panel(bot, database, state, place).await?;
            }
        }
        "/cancel" if config.is_admin(user.id) => {
            let text = match intake.cancel(user.id).await {
                true => "Cancelled.",
                false => "There was nothing to cancel.",
            };
            bot.send_message(chat, text).await?;
        }
        // "/help" and anything unknown yields false and hence
        // causes the help message to be printed.
        _ => return Ok(false),
    }

    Ok(true)
}

pub async fn handle_message(
    bot: Bot,
    me: Me,
    message: Message,
    database: Arc<Database>,
    config: Arc<Config>,
    intake: Arc<AdminIntake>,
) -> Result<(), RequestError> {
    // This bot only talks to people in private.
    if !message.chat.is_private() {
        return Ok(());
    }
    let Some(user) = message.from.as_ref() else {
        return Ok(());
    };
    touch_user(&database, user).await;

    if handle_command(&bot, &me, &message, user, &database, &config, &intake).await? {
        return Ok(());
    }

    // Anyone other than the admin never gets near the intake.
    if config.is_admin(user.id) {
        if let Some(text) = message.text_full().filter(|x| !x.starts_with('/')) {
            if let Some(outcome) = intake.complete(&database, user.id, text).await {
                return admin::report_intake(&bot, message.chat.id, outcome).await;
            }
        }
    }

    // Telegram automatically trims preceding and following newlines, so this is fine.
    bot.send_message(message.chat.id, views::HELP).await?;
    Ok(())
}
