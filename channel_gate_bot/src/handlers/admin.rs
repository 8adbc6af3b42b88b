use teloxide::{types::ChatId, Bot, RequestError};

use super::{callbacks::ChannelTable, send_or_edit, views, Place};
use crate::{
    database::Database,
    intake::{IntakeOutcome, IntakeState, NewChannel},
};

pub async fn show_panel(
    bot: &Bot,
    database: &Database,
    intake: IntakeState,
    place: Place,
) -> Result<(), RequestError> {
    let counts = match database.counts().await {
        Ok(x) => x,
        Err(e) => {
            log::error!("Failed to count things for the admin panel: {e}");
            return send_or_edit(bot, place, views::GENERIC_ERROR.to_string(), None).await;
        }
    };

    let view = views::admin_panel(&counts, intake);
    send_or_edit(bot, place, view.text, Some(view.keyboard)).await
}

pub async fn show_removal_list(
    bot: &Bot,
    database: &Database,
    table: ChannelTable,
    place: Place,
) -> Result<(), RequestError> {
    let view = match table {
        ChannelTable::Subscription => database
            .list_subscription_channels()
            .await
            .map(|x| views::removal_list_subscription(&x)),
        ChannelTable::Referral => database
            .list_referral_channels()
            .await
            .map(|x| views::removal_list_referral(&x)),
    };

    match view {
        Ok(view) => send_or_edit(bot, place, view.text, Some(view.keyboard)).await,
        Err(e) => {
            log::error!("Failed to list channels for removal: {e}");
            send_or_edit(bot, place, views::GENERIC_ERROR.to_string(), None).await
        }
    }
}

/// Removes the channel and returns what to tell the admin about it.
pub async fn remove_channel(database: &Database, table: ChannelTable, id: i64) -> &'static str {
    let result = match table {
        ChannelTable::Subscription => {
            match database.get_subscription_channel(id).await {
                Ok(Some(channel)) => log::info!(
                    "Removing {} channel {id} \"{}\" ({})",
                    channel.kind,
                    channel.name,
                    channel.url
                ),
                Ok(None) => (),
                Err(e) => log::warn!("Failed to look up channel {id} before removal: {e}"),
            }
            match database.count_confirmations_of(id).await {
                Ok(n) => log::info!("Channel {id} takes {n} confirmations with it"),
                Err(e) => log::warn!("Failed to count confirmations of channel {id}: {e}"),
            }
            database.remove_subscription_channel(id).await
        }
        ChannelTable::Referral => database.remove_referral_channel(id).await,
    };

    match result {
        Ok(true) => {
            log::info!("Removed {table:?} channel {id}");
            "✅ Channel removed."
        }
        Ok(false) => "This channel is already gone.",
        Err(e) => {
            log::error!("Failed to remove {table:?} channel {id}: {e}");
            views::GENERIC_ERROR
        }
    }
}

/// Tell the admin how their "add channel" message went.
pub async fn report_intake(
    bot: &Bot,
    chat: ChatId,
    outcome: IntakeOutcome,
) -> Result<(), RequestError> {
    let text = match outcome {
        IntakeOutcome::Added { kind, id, channel } => {
            let details = match &channel {
                NewChannel::Subscription(x) => match &x.handle {
                    Some(handle) => format!("{} ({})", x.url, handle),
                    None => x.url.clone(),
                },
                NewChannel::Referral(x) => x.url.clone(),
            };
            format!(
                "✅ Added {kind} channel #{id}: <b>{}</b>\n{}",
                html_escape::encode_text(channel.name()),
                html_escape::encode_text(&details),
            )
        }
        IntakeOutcome::Malformed { kind, error } => format!(
            "❌ That doesn't look right: {}.\n\n\
            Expected format:\n{}\n\n\
            Press the button in /admin to try again.",
            html_escape::encode_text(&error.to_string()),
            kind.expected_format(),
        ),
        IntakeOutcome::StoreFailed { kind } => format!(
            "❌ Couldn't save the {kind} channel. Maybe it's already added? Please try again."
        ),
    };

    send_or_edit(bot, Place::New(chat), text, None).await
}
