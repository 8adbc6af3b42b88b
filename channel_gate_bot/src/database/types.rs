use chrono::{DateTime, Utc};
use teloxide::types::UserId;

use crate::{misc::canonical_channel_url, types::ChannelKind};

/// A user of the bot, as remembered by the database.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: UserId,
    pub username: Option<String>,
    pub full_name: String,
    pub joined_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub total_checks: i64,
}

/// A channel users have to be in to pass the gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionChannel {
    pub id: i64,
    /// `@username` or numeric chat ID, if this channel can be looked up.
    pub handle: Option<String>,
    /// Invite link.
    pub url: String,
    pub name: String,
    pub kind: ChannelKind,
    pub created_at: DateTime<Utc>,
}

impl SubscriptionChannel {
    /// Link users should open to join this channel.
    #[must_use]
    pub fn browsable_url(&self) -> String {
        canonical_channel_url(&self.url, self.handle.as_deref())
    }
}

/// A channel users are given a link to once they pass the gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferralChannel {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// New subscription channel to be inserted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSubscriptionChannel {
    pub handle: Option<String>,
    pub url: String,
    pub name: String,
    pub kind: ChannelKind,
}

/// New referral channel to be inserted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewReferralChannel {
    pub url: String,
    pub name: String,
    pub description: Option<String>,
}

/// Row counts shown in the admin panel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    pub users: i64,
    pub public_channels: i64,
    pub private_channels: i64,
    pub referral_channels: i64,
    pub confirmations: i64,
}

impl Counts {
    pub fn subscription_channels(&self) -> i64 {
        self.public_channels + self.private_channels
    }
}
