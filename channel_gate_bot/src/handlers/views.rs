use std::fmt::Write;

use html_escape::{encode_double_quoted_attribute, encode_text};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use super::callbacks::{CallbackAction, ChannelTable};
use crate::{
    database::types::{Counts, ReferralChannel, SubscriptionChannel, UserRecord},
    intake::IntakeState,
    misc::parse_url_like_telegram,
    types::{ChannelKind, Evaluation, IntakeKind},
};

/// A message to send: HTML text and its buttons.
pub struct View {
    pub text: String,
    pub keyboard: InlineKeyboardMarkup,
}

fn button(text: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.to_string())
}

/// A button that opens the link, if the link is usable for that.
fn url_button(text: impl Into<String>, url: &str) -> Option<InlineKeyboardButton> {
    let url = parse_url_like_telegram(url).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| InlineKeyboardButton::url(text, url))
}

fn link(name: &str, url: &str) -> String {
    format!(
        "<a href=\"{}\">{}</a>",
        encode_double_quoted_attribute(url),
        encode_text(name)
    )
}

pub const GENERIC_ERROR: &str = "Something went wrong on our side. Please try again in a bit.";

pub const HELP: &str = "
This bot gives out access to a channel to those who joined our partner channels.

/start or /check: see which channels are left to join, and get the link once there are none.
/stats: bot statistics.";

pub const ACCESS_DENIED: &str = "⛔ Access denied.";

/// What a user sees after being checked against the channels.
pub fn gate(evaluation: &Evaluation, referral: Option<&ReferralChannel>) -> View {
    if evaluation.all_subscribed() {
        return gate_passed(referral);
    }

    let mut text = String::from("<b>To get access, join these channels first:</b>\n\n");
    let mut rows = Vec::new();

    for (n, channel) in evaluation.missing.iter().enumerate() {
        write!(text, "{}. {}", n + 1, link(&channel.name, &channel.url))
            .expect("Writing to a String never fails");
        if channel.kind == ChannelKind::Private {
            text.push_str(" (private)");
        }
        text.push('\n');

        let mut row = Vec::new();
        if let Some(join) = url_button(format!("➕ Join {}", channel.name), &channel.url) {
            row.push(join);
        }
        if channel.can_self_confirm() {
            row.push(button(
                format!("✅ I joined {}", channel.name),
                CallbackAction::Confirm(channel.channel_id),
            ));
        }
        if !row.is_empty() {
            rows.push(row);
        }
    }

    text.push_str("\nOnce you've joined, press the button below.");
    rows.push(vec![button("🔄 Check again", CallbackAction::Check)]);

    View {
        text,
        keyboard: InlineKeyboardMarkup::new(rows),
    }
}

fn gate_passed(referral: Option<&ReferralChannel>) -> View {
    let Some(referral) = referral else {
        return View {
            text: concat!(
                "✅ You've joined all the channels!\n\n",
                "The access link isn't ready yet though. Please check again later."
            )
            .to_string(),
            keyboard: InlineKeyboardMarkup::new(vec![vec![button(
                "🔄 Check again",
                CallbackAction::Check,
            )]]),
        };
    };

    let mut text = format!(
        "✅ You've joined all the channels!\n\nHere is your access: {}",
        link(&referral.name, &referral.url)
    );
    if let Some(description) = &referral.description {
        write!(text, "\n<i>{}</i>", encode_text(description))
            .expect("Writing to a String never fails");
    }

    let rows = url_button(format!("🎁 {}", referral.name), &referral.url)
        .map(|x| vec![vec![x]])
        .unwrap_or_default();

    View {
        text,
        keyboard: InlineKeyboardMarkup::new(rows),
    }
}

pub fn admin_panel(counts: &Counts, intake: IntakeState) -> View {
    let mut text = format!(
        "<b>👨‍💻 Admin panel</b>\n\n\
        Users: {}\n\
        Channels to join: {} ({} public, {} private)\n\
        Referral channels: {}\n\
        Confirmed subscriptions: {}",
        counts.users,
        counts.subscription_channels(),
        counts.public_channels,
        counts.private_channels,
        counts.referral_channels,
        counts.confirmations,
    );
    if let IntakeState::AwaitingChannelInput(kind) = intake {
        write!(
            text,
            "\n\n⏳ Waiting for a new {kind} channel from you. /cancel to stop."
        )
        .expect("Writing to a String never fails");
    }

    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![
            button("➕ Public", CallbackAction::Add(IntakeKind::Public)),
            button("➕ Private", CallbackAction::Add(IntakeKind::Private)),
            button("➕ Referral", CallbackAction::Add(IntakeKind::Referral)),
        ],
        vec![
            button(
                "🗑 Channel to join",
                CallbackAction::ListRemovable(ChannelTable::Subscription),
            ),
            button(
                "🗑 Referral",
                CallbackAction::ListRemovable(ChannelTable::Referral),
            ),
        ],
        vec![button("🔄 Refresh", CallbackAction::AdminPanel)],
    ]);

    View { text, keyboard }
}

/// Public statistics, plus what the bot knows of the user asking.
pub fn stats(counts: &Counts, user: Option<&UserRecord>) -> String {
    let mut text = format!(
        "📊 Bot statistics:\n\
        • Users: {}\n\
        • Channels to join: {}",
        counts.users,
        counts.subscription_channels(),
    );
    if let Some(user) = user {
        write!(
            text,
            "\n\nYou've been around since {} and went through the gate {} times.",
            user.joined_at.format("%Y-%m-%d"),
            user.total_checks,
        )
        .expect("Writing to a String never fails");
    }
    text.push_str("\n\nCheck your subscriptions: /check");
    text
}

pub fn intake_prompt(kind: IntakeKind) -> String {
    format!(
        "Send the new {kind} channel in this format:\n{}\n\nOr /cancel to stop.",
        kind.expected_format()
    )
}

pub fn removal_list_subscription(channels: &[SubscriptionChannel]) -> View {
    let rows = channels
        .iter()
        .map(|x| {
            let label = match &x.handle {
                Some(handle) => format!("❌ {} ({}, {})", x.name, x.kind, handle),
                None => format!("❌ {} ({})", x.name, x.kind),
            };
            vec![button(
                label,
                CallbackAction::Remove(ChannelTable::Subscription, x.id),
            )]
        })
        .collect();
    removal_list(channels.is_empty(), rows)
}

pub fn removal_list_referral(channels: &[ReferralChannel]) -> View {
    let rows = channels
        .iter()
        .map(|x| {
            vec![button(
                format!("❌ {}", x.name),
                CallbackAction::Remove(ChannelTable::Referral, x.id),
            )]
        })
        .collect();
    removal_list(channels.is_empty(), rows)
}

fn removal_list(empty: bool, mut rows: Vec<Vec<InlineKeyboardButton>>) -> View {
    rows.push(vec![button("⬅️ Back", CallbackAction::AdminPanel)]);
    View {
        text: match empty {
            true => "📭 There are no channels of this kind.".to_string(),
            false => "Pick a channel to remove:".to_string(),
        },
        keyboard: InlineKeyboardMarkup::new(rows),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use teloxide::types::InlineKeyboardButtonKind;

    use super::*;
    use crate::types::MissingChannel;

    fn callback_data(keyboard: &InlineKeyboardMarkup) -> Vec<String> {
        keyboard
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|x| match &x.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn failed_gate_lists_channels() {
        let evaluation = Evaluation {
            missing: vec![
                MissingChannel {
                    channel_id: 1,
                    name: "News & <stuff>".to_string(),
                    kind: ChannelKind::Public,
                    url: "https://t.me/news".to_string(),
                },
                MissingChannel {
                    channel_id: 2,
                    name: "vip".to_string(),
                    kind: ChannelKind::Private,
                    url: "https://t.me/+vip".to_string(),
                },
            ],
        };

        let view = gate(&evaluation, None);
        assert!(view.text.contains("News &amp; &lt;stuff&gt;"));
        assert!(view.text.contains("vip</a> (private)"));
        // Only the private channel can be confirmed by hand.
        assert_eq!(
            callback_data(&view.keyboard),
            vec!["CONFIRM 2".to_string(), "CHECK".to_string()]
        );
        assert_eq!(view.keyboard.inline_keyboard.len(), 3);
    }

    #[test]
    fn passed_gate_shows_referral() {
        let referral = ReferralChannel {
            id: 1,
            url: "https://t.me/+reward".to_string(),
            name: "Reward".to_string(),
            description: Some("Cool stuff".to_string()),
            created_at: Utc::now(),
        };

        let view = gate(&Evaluation::default(), Some(&referral));
        assert!(view.text.contains("https://t.me/+reward"));
        assert!(view.text.contains("<i>Cool stuff</i>"));
        assert!(callback_data(&view.keyboard).is_empty());

        let view = gate(&Evaluation::default(), None);
        assert_eq!(callback_data(&view.keyboard), vec!["CHECK".to_string()]);
    }

    #[test]
    fn admin_panel_mentions_pending_intake() {
        let counts = Counts::default();
        let view = admin_panel(&counts, IntakeState::Idle);
        assert!(!view.text.contains("/cancel"));

        let view = admin_panel(
            &counts,
            IntakeState::AwaitingChannelInput(IntakeKind::Referral),
        );
        assert!(view.text.contains("new referral channel"));
        assert!(view.text.contains("/cancel"));
    }

    #[test]
    fn stats_include_the_asking_user() {
        let counts = Counts::default();
        assert!(!stats(&counts, None).contains("went through the gate"));

        let user = UserRecord {
            user_id: teloxide::types::UserId(42),
            username: None,
            full_name: "Ada".to_string(),
            joined_at: Utc::now(),
            last_active: Utc::now(),
            total_checks: 3,
        };
        assert!(stats(&counts, Some(&user)).contains("went through the gate 3 times"));
    }

    #[test]
    fn unusable_links_get_no_button() {
        assert!(url_button("x", "not a link").is_none());
        assert!(url_button("x", "t.me/news").is_some());
    }
}
