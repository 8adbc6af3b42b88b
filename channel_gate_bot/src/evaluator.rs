//! Deciding whether a user has joined every channel they need to.
//!
//! Public channels are always checked live. Private channels are checked
//! live when they have a handle the bot can look up, and the result is
//! written back into the confirmation table so that a user who leaves loses
//! their confirmation. Private channels without a handle can't be checked at
//! all, so the user's own confirmation is all there is to go on.

use std::time::Duration;

use teloxide::types::UserId;

use crate::{
    database::{self, types::SubscriptionChannel, Database},
    membership::{is_subscribed_status, MembershipLookup},
    types::{ChannelKind, Evaluation, MissingChannel},
};

/// Look the user up in the channel. Returns [`None`] if the lookup failed
/// or took longer than `timeout`.
async fn lookup_subscribed(
    lookup: &impl MembershipLookup,
    handle: &str,
    user: UserId,
    timeout: Duration,
) -> Option<bool> {
    match tokio::time::timeout(timeout, lookup.member_status(handle, user)).await {
        Ok(Ok(status)) => Some(is_subscribed_status(status)),
        Ok(Err(e)) => {
            log::debug!("Failed to look up user {user} in {handle}: {e}");
            None
        }
        Err(_) => {
            log::warn!("Looking up user {user} in {handle} timed out");
            None
        }
    }
}

/// Returns `true` if the user counts as subscribed to this channel.
async fn is_subscribed_to(
    database: &Database,
    lookup: &impl MembershipLookup,
    user: UserId,
    channel: &SubscriptionChannel,
    timeout: Duration,
) -> Result<bool, database::Error> {
    let handle = channel.handle.as_deref();

    match (channel.kind, handle) {
        (ChannelKind::Public, Some(handle)) => Ok(lookup_subscribed(lookup, handle, user, timeout)
            .await
            .unwrap_or(false)),
        // Can't check it, can't take the user's word for it either.
        (ChannelKind::Public, None) => Ok(false),
        (ChannelKind::Private, Some(handle)) => {
            match lookup_subscribed(lookup, handle, user, timeout).await {
                Some(true) => {
                    if let Err(e) = database.set_confirmed(user, channel.id).await {
                        log::warn!("Failed to confirm channel {} for {user}: {e}", channel.id);
                    }
                    Ok(true)
                }
                Some(false) => {
                    if let Err(e) = database.delete_confirmation(user, channel.id).await {
                        log::warn!(
                            "Failed to drop confirmation of channel {} for {user}: {e}",
                            channel.id
                        );
                    }
                    Ok(false)
                }
                None => database.is_confirmed(user, channel.id).await,
            }
        }
        (ChannelKind::Private, None) => database.is_confirmed(user, channel.id).await,
    }
}

/// Check the user against every subscription channel, in order, and collect
/// the ones they still need to join.
///
/// Note that this is not a pure read: for private channels that can be looked up,
/// the user's confirmation is updated to whatever the lookup said.
pub async fn evaluate(
    database: &Database,
    lookup: &impl MembershipLookup,
    user: UserId,
    lookup_timeout: Duration,
) -> Result<Evaluation, database::Error> {
    let channels = database.list_subscription_channels().await?;
    let mut missing = Vec::new();

    for channel in &channels {
        if is_subscribed_to(database, lookup, user, channel, lookup_timeout).await? {
            continue;
        }

        missing.push(MissingChannel {
            channel_id: channel.id,
            name: channel.name.clone(),
            kind: channel.kind,
            url: channel.browsable_url(),
        });
    }

    log::debug!(
        "User {user} is missing {} out of {} channels",
        missing.len(),
        channels.len()
    );

    Ok(Evaluation { missing })
}

/// Record that the user says they joined this channel, whether or not that's true.
/// Returns `false` if that couldn't be saved.
pub async fn confirm(database: &Database, user: UserId, channel_id: i64) -> bool {
    match database.set_confirmed(user, channel_id).await {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Failed to save confirmation of channel {channel_id} by {user}: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use teloxide::types::ChatMemberStatus;

    use super::*;
    use crate::{
        database::types::NewSubscriptionChannel,
        membership::fake::{FakeLookup, HangingLookup},
    };

    const TIMEOUT: Duration = Duration::from_secs(5);
    const USER: UserId = UserId(1000);

    async fn add(db: &Database, handle: Option<&str>, name: &str, kind: ChannelKind) -> i64 {
        db.add_subscription_channel(&NewSubscriptionChannel {
            handle: handle.map(str::to_string),
            url: format!("https://t.me/+{name}"),
            name: name.to_string(),
            kind,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn no_channels_means_subscribed() {
        let db = Database::new_in_memory().await.unwrap();
        let lookup = FakeLookup::default();

        let evaluation = evaluate(&db, &lookup, USER, TIMEOUT).await.unwrap();
        assert!(evaluation.all_subscribed());
        assert!(evaluation.missing.is_empty());
        assert_eq!(lookup.calls(), 0);
    }

    #[tokio::test]
    async fn public_channel_follows_live_status() {
        use ChatMemberStatus::*;

        for (status, subscribed) in [
            (Member, true),
            (Administrator, true),
            (Owner, true),
            (Left, false),
            (Banned, false),
            (Restricted, false),
        ] {
            let db = Database::new_in_memory().await.unwrap();
            add(&db, Some("@news"), "news", ChannelKind::Public).await;
            let lookup = FakeLookup::default().with("@news", USER, status);

            let evaluation = evaluate(&db, &lookup, USER, TIMEOUT).await.unwrap();
            assert_eq!(evaluation.all_subscribed(), subscribed, "{status:?}");
        }
    }

    #[tokio::test]
    async fn public_channel_ignores_confirmation_when_lookup_fails() {
        let db = Database::new_in_memory().await.unwrap();
        let news = add(&db, Some("@news"), "news", ChannelKind::Public).await;
        db.set_confirmed(USER, news).await.unwrap();
        let lookup = FakeLookup::default();

        let evaluation = evaluate(&db, &lookup, USER, TIMEOUT).await.unwrap();
        assert_eq!(evaluation.missing.len(), 1);
        assert_eq!(evaluation.missing[0].channel_id, news);
        assert_eq!(evaluation.missing[0].url, "https://t.me/+news");
        assert_eq!(lookup.calls(), 1);
    }

    #[tokio::test]
    async fn public_channel_without_handle_always_fails() {
        let db = Database::new_in_memory().await.unwrap();
        let broken = add(&db, None, "broken", ChannelKind::Public).await;
        db.set_confirmed(USER, broken).await.unwrap();
        let lookup = FakeLookup::default();

        let evaluation = evaluate(&db, &lookup, USER, TIMEOUT).await.unwrap();
        assert!(!evaluation.all_subscribed());
        assert_eq!(evaluation.missing[0].kind, ChannelKind::Public);
        assert!(!evaluation.missing[0].can_self_confirm());
        assert_eq!(lookup.calls(), 0);
    }

    #[tokio::test]
    async fn private_channel_live_member_gets_confirmed() {
        let db = Database::new_in_memory().await.unwrap();
        let vip = add(&db, Some("-1001234567890"), "vip", ChannelKind::Private).await;
        let lookup = FakeLookup::default().with("-1001234567890", USER, ChatMemberStatus::Member);

        for _ in 0..2 {
            let evaluation = evaluate(&db, &lookup, USER, TIMEOUT).await.unwrap();
            assert!(evaluation.all_subscribed());
            assert!(db.is_confirmed(USER, vip).await.unwrap());
            assert_eq!(db.count_confirmations_of(vip).await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn private_channel_live_leaver_loses_confirmation() {
        let db = Database::new_in_memory().await.unwrap();
        let vip = add(&db, Some("@vip"), "vip", ChannelKind::Private).await;
        db.set_confirmed(USER, vip).await.unwrap();
        let lookup = FakeLookup::default().with("@vip", USER, ChatMemberStatus::Left);

        for _ in 0..2 {
            let evaluation = evaluate(&db, &lookup, USER, TIMEOUT).await.unwrap();
            assert!(!evaluation.all_subscribed());
            assert!(!db.is_confirmed(USER, vip).await.unwrap());
            assert_eq!(db.count_confirmations_of(vip).await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn private_channel_falls_back_to_confirmation_when_lookup_fails() {
        let db = Database::new_in_memory().await.unwrap();
        let vip = add(&db, Some("@vip"), "vip", ChannelKind::Private).await;
        let lookup = FakeLookup::default();

        let evaluation = evaluate(&db, &lookup, USER, TIMEOUT).await.unwrap();
        assert_eq!(evaluation.missing.len(), 1);
        assert_eq!(db.count_confirmations_of(vip).await.unwrap(), 0);

        db.set_confirmed(USER, vip).await.unwrap();
        let evaluation = evaluate(&db, &lookup, USER, TIMEOUT).await.unwrap();
        assert!(evaluation.all_subscribed());
        assert!(db.is_confirmed(USER, vip).await.unwrap());
        assert_eq!(lookup.calls(), 2);
    }

    #[tokio::test]
    async fn timed_out_lookup_counts_as_failed() {
        let db = Database::new_in_memory().await.unwrap();
        let news = add(&db, Some("@news"), "news", ChannelKind::Public).await;
        let vip = add(&db, Some("@vip"), "vip", ChannelKind::Private).await;
        let club = add(&db, Some("@club"), "club", ChannelKind::Private).await;
        db.set_confirmed(USER, news).await.unwrap();
        db.set_confirmed(USER, vip).await.unwrap();
        let lookup = HangingLookup::default();

        let evaluation = evaluate(&db, &lookup, USER, Duration::from_millis(50))
            .await
            .unwrap();
        let ids: Vec<i64> = evaluation.missing.iter().map(|x| x.channel_id).collect();
        assert_eq!(ids, vec![news, club]);
        assert_eq!(lookup.calls(), 3);

        // Nothing was written back without an answer.
        assert!(db.is_confirmed(USER, vip).await.unwrap());
        assert_eq!(db.count_confirmations_of(vip).await.unwrap(), 1);
        assert_eq!(db.count_confirmations_of(club).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn private_channel_without_handle_trusts_confirmation() {
        let db = Database::new_in_memory().await.unwrap();
        let secret = add(&db, None, "secret", ChannelKind::Private).await;
        let lookup = FakeLookup::default();

        let evaluation = evaluate(&db, &lookup, USER, TIMEOUT).await.unwrap();
        assert_eq!(evaluation.missing.len(), 1);
        assert!(evaluation.missing[0].can_self_confirm());

        assert!(confirm(&db, USER, secret).await);
        let evaluation = evaluate(&db, &lookup, USER, TIMEOUT).await.unwrap();
        assert!(evaluation.all_subscribed());

        // Someone else's confirmation doesn't count.
        let evaluation = evaluate(&db, &lookup, UserId(1), TIMEOUT).await.unwrap();
        assert!(!evaluation.all_subscribed());

        assert_eq!(lookup.calls(), 0);
    }

    #[tokio::test]
    async fn confirm_always_confirms() {
        let db = Database::new_in_memory().await.unwrap();
        let vip = add(&db, Some("@vip"), "vip", ChannelKind::Private).await;

        assert!(confirm(&db, USER, vip).await);
        assert!(db.is_confirmed(USER, vip).await.unwrap());
        assert!(confirm(&db, USER, vip).await);
        assert!(db.is_confirmed(USER, vip).await.unwrap());

        assert!(!confirm(&db, USER, vip + 100).await);
    }

    #[tokio::test]
    async fn news_member_but_left_vip() {
        let db = Database::new_in_memory().await.unwrap();
        add(&db, Some("@news"), "news", ChannelKind::Public).await;
        let vip = add(&db, Some("@vip"), "vip", ChannelKind::Private).await;
        db.set_confirmed(USER, vip).await.unwrap();
        let lookup = FakeLookup::default()
            .with("@news", USER, ChatMemberStatus::Member)
            .with("@vip", USER, ChatMemberStatus::Left);

        let evaluation = evaluate(&db, &lookup, USER, TIMEOUT).await.unwrap();
        assert!(!evaluation.all_subscribed());
        assert_eq!(
            evaluation.missing,
            vec![MissingChannel {
                channel_id: vip,
                name: "vip".to_string(),
                kind: ChannelKind::Private,
                url: "https://t.me/+vip".to_string(),
            }]
        );
        assert!(!db.is_confirmed(USER, vip).await.unwrap());
        assert_eq!(lookup.calls(), 2);
    }

    #[tokio::test]
    async fn missing_channels_keep_listing_order() {
        let db = Database::new_in_memory().await.unwrap();
        let a = add(&db, None, "a", ChannelKind::Private).await;
        let b = add(&db, Some("@b"), "b", ChannelKind::Public).await;
        let c = add(&db, None, "c", ChannelKind::Private).await;
        let lookup = FakeLookup::default();

        let evaluation = evaluate(&db, &lookup, USER, TIMEOUT).await.unwrap();
        let ids: Vec<i64> = evaluation.missing.iter().map(|x| x.channel_id).collect();
        assert_eq!(ids, vec![a, b, c]);
    }
}
