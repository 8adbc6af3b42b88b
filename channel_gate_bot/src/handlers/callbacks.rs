use std::{fmt::Display, sync::Arc};

use teloxide::{
    payloads::AnswerCallbackQuerySetters, requests::Requester, types::CallbackQuery, Bot,
    RequestError,
};

use super::{admin, send_or_edit, views, Place};
use crate::{config::Config, database::Database, evaluator, intake::AdminIntake, types::IntakeKind};

/// Which table of channels a button is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelTable {
    Subscription,
    Referral,
}

impl ChannelTable {
    fn as_str(&self) -> &'static str {
        match self {
            ChannelTable::Subscription => "sub",
            ChannelTable::Referral => "ref",
        }
    }

    fn from_token(value: &str) -> Option<Self> {
        match value {
            "sub" => Some(ChannelTable::Subscription),
            "ref" => Some(ChannelTable::Referral),
            _ => None,
        }
    }
}

/// What a button press asks for. Stored in the button's callback data,
/// which Telegram limits to 64 bytes, as space separated words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// Re-run the subscription check.
    Check,
    /// The user claims to have joined this subscription channel.
    Confirm(i64),
    /// Show the admin panel.
    AdminPanel,
    /// Start adding a channel of this kind.
    Add(IntakeKind),
    /// List channels from this table with buttons to remove them.
    ListRemovable(ChannelTable),
    /// Remove the channel with this ID from this table.
    Remove(ChannelTable, i64),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let mut iter = data.split_ascii_whitespace();
        let action = match iter.next()? {
            "CHECK" => CallbackAction::Check,
            "CONFIRM" => CallbackAction::Confirm(iter.next()?.parse().ok()?),
            "ADMIN" => CallbackAction::AdminPanel,
            "ADD" => CallbackAction::Add(IntakeKind::from_token(iter.next()?)?),
            "LIST" => CallbackAction::ListRemovable(ChannelTable::from_token(iter.next()?)?),
            "REMOVE" => CallbackAction::Remove(
                ChannelTable::from_token(iter.next()?)?,
                iter.next()?.parse().ok()?,
            ),
            _ => return None,
        };

        // Extraneous data
        if iter.next().is_some() {
            return None;
        }

        Some(action)
    }

    /// Whether only the admin may press this.
    pub fn is_admin_only(&self) -> bool {
        !matches!(self, CallbackAction::Check | CallbackAction::Confirm(_))
    }
}

impl Display for CallbackAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackAction::Check => write!(f, "CHECK"),
            CallbackAction::Confirm(id) => write!(f, "CONFIRM {id}"),
            CallbackAction::AdminPanel => write!(f, "ADMIN"),
            CallbackAction::Add(kind) => write!(f, "ADD {kind}"),
            CallbackAction::ListRemovable(table) => write!(f, "LIST {}", table.as_str()),
            CallbackAction::Remove(table, id) => write!(f, "REMOVE {} {id}", table.as_str()),
        }
    }
}

pub async fn handle_callback_query(
    bot: Bot,
    query: CallbackQuery,
    database: Arc<Database>,
    config: Arc<Config>,
    intake: Arc<AdminIntake>,
) -> Result<(), RequestError> {
    macro_rules! goodbye {
        ($text:expr) => {
            bot.answer_callback_query(query.id.clone())
                .text($text)
                .await?;
            return Ok(());
        };
        () => {
            bot.answer_callback_query(query.id.clone()).await?;
            return Ok(());
        };
    }

    let user = &query.from;
    super::touch_user(&database, user).await;

    let Some(action) = query.data.as_deref().and_then(CallbackAction::parse) else {
        log::debug!("Unknown callback data: {:?}", query.data);
        goodbye!("This button doesn't work anymore.");
    };

    if action.is_admin_only() && !config.is_admin(user.id) {
        log::info!("Non-admin {} pressed admin button {action}", user.id);
        goodbye!(views::ACCESS_DENIED);
    }

    let Some(message) = &query.message else {
        // May happen if the message is too old
        goodbye!("This message is too old, please send /start again.");
    };
    let place = Place::Edit(message.chat().id, message.id());

    match action {
        CallbackAction::Check => {
            super::run_gate(&bot, &database, &config, user, place).await?;
        }
        CallbackAction::Confirm(channel_id) => {
            if !evaluator::confirm(&database, user.id, channel_id).await {
                goodbye!(views::GENERIC_ERROR);
            }
            super::run_gate(&bot, &database, &config, user, place).await?;
        }
        CallbackAction::AdminPanel => {
            let state = intake.state(user.id).await;
            admin::show_panel(&bot, &database, state, place).await?;
        }
        CallbackAction::Add(kind) => {
            intake.begin(user.id, kind).await;
            send_or_edit(
                &bot,
                Place::New(message.chat().id),
                views::intake_prompt(kind),
                None,
            )
            .await?;
        }
        CallbackAction::ListRemovable(table) => {
            admin::show_removal_list(&bot, &database, table, place).await?;
        }
        CallbackAction::Remove(table, id) => {
            let text = admin::remove_channel(&database, table, id).await;
            bot.answer_callback_query(query.id.clone())
                .text(text)
                .await?;
            admin::show_removal_list(&bot, &database, table, place).await?;
            return Ok(());
        }
    }

    goodbye!();
}
