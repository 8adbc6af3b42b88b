//! The admin's "add a channel" conversation.
//!
//! An admin presses one of the "add channel" buttons, and their next text
//! message is taken to be the description of the new channel. Whether that
//! message makes sense or not, the flow ends there.
//!
//! This lives purely in memory. A restart forgets any flow in progress,
//! and the admin will just have to press the button again.

use std::collections::HashMap;

use teloxide::types::UserId;
use tokio::sync::Mutex;

use crate::{
    database::{
        types::{NewReferralChannel, NewSubscriptionChannel},
        Database,
    },
    misc::{is_channel_handle, is_chat_id, parse_invite_link, parse_url_like_telegram},
    types::{ChannelKind, IntakeKind},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IntakeState {
    #[default]
    Idle,
    AwaitingChannelInput(IntakeKind),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    #[error("the message is empty")]
    Empty,
    #[error("expected a handle starting with @, got \"{0}\"")]
    NotAHandle(String),
    #[error("expected an invite link, got \"{0}\"")]
    NotALink(String),
    #[error("the channel name is missing")]
    NoName,
}

/// A channel parsed out of the admin's message, not yet saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewChannel {
    Subscription(NewSubscriptionChannel),
    Referral(NewReferralChannel),
}

impl NewChannel {
    pub fn name(&self) -> &str {
        match self {
            NewChannel::Subscription(x) => &x.name,
            NewChannel::Referral(x) => &x.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// The channel was saved under this ID.
    Added {
        kind: IntakeKind,
        id: i64,
        channel: NewChannel,
    },
    /// The message didn't match what this kind of channel needs.
    Malformed {
        kind: IntakeKind,
        error: IntakeError,
    },
    /// The message was fine, but the database refused it.
    StoreFailed { kind: IntakeKind },
}

/// Split off the first whitespace-separated word, returning it and the trimmed rest.
fn split_first_word(text: &str) -> Option<(&str, &str)> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(match text.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (text, ""),
    })
}

/// `@handle Channel name`
pub fn parse_public(text: &str) -> Result<NewSubscriptionChannel, IntakeError> {
    let (handle, name) = split_first_word(text).ok_or(IntakeError::Empty)?;

    if !is_channel_handle(handle) {
        return Err(IntakeError::NotAHandle(handle.to_string()));
    }
    if name.is_empty() {
        return Err(IntakeError::NoName);
    }

    let url =
        parse_url_like_telegram(handle).map_err(|_| IntakeError::NotAHandle(handle.to_string()))?;

    Ok(NewSubscriptionChannel {
        handle: Some(handle.to_string()),
        url: url.to_string(),
        name: name.to_string(),
        kind: ChannelKind::Public,
    })
}

/// `https://invite.link Channel name`, optionally preceded by a handle or chat ID
/// the bot can use to check members with.
pub fn parse_private(text: &str) -> Result<NewSubscriptionChannel, IntakeError> {
    let (first, rest) = split_first_word(text).ok_or(IntakeError::Empty)?;

    let (handle, rest) = if is_channel_handle(first) || is_chat_id(first) {
        (Some(first), rest)
    } else {
        (None, text.trim())
    };

    let (link, name) = split_first_word(rest).ok_or(IntakeError::NotALink(String::new()))?;
    let url = parse_invite_link(link).ok_or_else(|| IntakeError::NotALink(link.to_string()))?;

    if name.is_empty() {
        return Err(IntakeError::NoName);
    }

    Ok(NewSubscriptionChannel {
        handle: handle.map(str::to_string),
        url: url.to_string(),
        name: name.to_string(),
        kind: ChannelKind::Private,
    })
}

/// `https://invite.link Channel name`, or `Name description words https://invite.link`.
///
/// Names can look like links too (`Reward.Club`), so a link at the end wins,
/// unless only the first word spells out its scheme.
pub fn parse_referral(text: &str) -> Result<NewReferralChannel, IntakeError> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let [first, rest @ ..] = words.as_slice() else {
        return Err(IntakeError::Empty);
    };

    let first_link = parse_invite_link(first);
    let last_link = match rest {
        [middle @ .., last] => parse_invite_link(last).map(|url| (middle, url, *last)),
        [] => None,
    };

    let name_first = match (&first_link, &last_link) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(_), Some((_, _, last))) => has_scheme(last) || !has_scheme(first),
    };

    if let (true, Some((middle, url, _))) = (name_first, last_link) {
        return Ok(NewReferralChannel {
            url: url.to_string(),
            name: first.to_string(),
            description: (!middle.is_empty()).then(|| middle.join(" ")),
        });
    }

    let Some(url) = first_link else {
        return Err(IntakeError::NotALink(first.to_string()));
    };
    if rest.is_empty() {
        return Err(IntakeError::NoName);
    }

    Ok(NewReferralChannel {
        url: url.to_string(),
        name: rest.join(" "),
        description: None,
    })
}

fn has_scheme(word: &str) -> bool {
    word.starts_with("https://") || word.starts_with("http://")
}

/// Parse the admin's message according to what they're adding.
pub fn parse(kind: IntakeKind, text: &str) -> Result<NewChannel, IntakeError> {
    match kind {
        IntakeKind::Public => parse_public(text).map(NewChannel::Subscription),
        IntakeKind::Private => parse_private(text).map(NewChannel::Subscription),
        IntakeKind::Referral => parse_referral(text).map(NewChannel::Referral),
    }
}

/// Per-admin intake flows in progress.
#[derive(Default)]
pub struct AdminIntake {
    states: Mutex<HashMap<UserId, IntakeState>>,
}

impl AdminIntake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the admin's next message be taken as a new channel of this kind.
    pub async fn begin(&self, admin: UserId, kind: IntakeKind) {
        self.states
            .lock()
            .await
            .insert(admin, IntakeState::AwaitingChannelInput(kind));
    }

    /// Where the admin is in their flow.
    pub async fn state(&self, admin: UserId) -> IntakeState {
        self.states
            .lock()
            .await
            .get(&admin)
            .copied()
            .unwrap_or_default()
    }

    /// Drop the flow. Returns `true` if there was one.
    pub async fn cancel(&self, admin: UserId) -> bool {
        self.take(admin).await != IntakeState::Idle
    }

    /// Returns the admin's state, leaving it [`IntakeState::Idle`].
    pub async fn take(&self, admin: UserId) -> IntakeState {
        self.states.lock().await.remove(&admin).unwrap_or_default()
    }

    /// Feed the admin's message into their flow, saving the channel it describes.
    /// Returns [`None`] if the admin wasn't adding anything.
    ///
    /// The flow is over afterwards, whether it went well or not.
    pub async fn complete(
        &self,
        database: &Database,
        admin: UserId,
        text: &str,
    ) -> Option<IntakeOutcome> {
        let IntakeState::AwaitingChannelInput(kind) = self.take(admin).await else {
            return None;
        };

        let channel = match parse(kind, text) {
            Ok(x) => x,
            Err(error) => {
                log::debug!("Admin {admin} sent malformed {kind} channel: {error}");
                return Some(IntakeOutcome::Malformed { kind, error });
            }
        };

        let result = match &channel {
            NewChannel::Subscription(x) => database.add_subscription_channel(x).await,
            NewChannel::Referral(x) => database.add_referral_channel(x).await,
        };

        Some(match result {
            Ok(id) => {
                log::info!("Admin {admin} added {kind} channel {id}: {}", channel.name());
                IntakeOutcome::Added { kind, id, channel }
            }
            Err(e) => {
                log::warn!("Failed to save {kind} channel from admin {admin}: {e}");
                IntakeOutcome::StoreFailed { kind }
            }
        })
    }
}
