use std::fmt::Display;

/// Kind of a channel users have to join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Verifiable by a live membership lookup by its handle.
    Public,
    /// May lack a resolvable handle, in which case users confirm joining it themselves.
    Private,
}

impl ChannelKind {
    /// Representation of this kind in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Public => "public",
            ChannelKind::Private => "private",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "public" => Some(ChannelKind::Public),
            "private" => Some(ChannelKind::Private),
            _ => None,
        }
    }
}

impl Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the admin is adding with the intake flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntakeKind {
    Public,
    Private,
    Referral,
}

impl IntakeKind {
    /// Token used for this kind in callback data.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntakeKind::Public => "public",
            IntakeKind::Private => "private",
            IntakeKind::Referral => "referral",
        }
    }

    pub fn from_token(value: &str) -> Option<Self> {
        match value {
            "public" => Some(IntakeKind::Public),
            "private" => Some(IntakeKind::Private),
            "referral" => Some(IntakeKind::Referral),
            _ => None,
        }
    }

    /// Human readable description of the input this kind expects.
    pub fn expected_format(&self) -> &'static str {
        match self {
            IntakeKind::Public => concat!(
                "<code>@handle Channel name</code>\n",
                "The bot must be an admin of the channel to check its members."
            ),
            IntakeKind::Private => concat!(
                "<code>https://t.me/+invite Channel name</code>\n",
                "or, if the bot is an admin there and can check members:\n",
                "<code>-1001234567890 https://t.me/+invite Channel name</code>"
            ),
            IntakeKind::Referral => concat!(
                "<code>https://t.me/+invite Channel name</code>\n",
                "or, with a description:\n",
                "<code>Name Some description words https://t.me/+invite</code>"
            ),
        }
    }
}

impl Display for IntakeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A channel the user still needs to join before passing the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingChannel {
    pub channel_id: i64,
    pub name: String,
    pub kind: ChannelKind,
    /// Canonical link to open the channel with.
    pub url: String,
}

impl MissingChannel {
    /// Whether the user may claim to have joined this channel themselves.
    pub fn can_self_confirm(&self) -> bool {
        self.kind == ChannelKind::Private
    }
}

/// Result of evaluating a user against all subscription channels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub missing: Vec<MissingChannel>,
}

impl Evaluation {
    pub fn all_subscribed(&self) -> bool {
        self.missing.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_survive_their_text_forms() {
        for kind in [ChannelKind::Public, ChannelKind::Private] {
            assert_eq!(ChannelKind::from_db(kind.as_str()), Some(kind));
        }
        for kind in [
            IntakeKind::Public,
            IntakeKind::Private,
            IntakeKind::Referral,
        ] {
            assert_eq!(IntakeKind::from_token(kind.as_str()), Some(kind));
        }
        assert_eq!(ChannelKind::from_db("referral"), None);
        assert_eq!(IntakeKind::from_token("PUBLIC"), None);
    }

    #[test]
    fn empty_evaluation_passes() {
        assert!(Evaluation::default().all_subscribed());
    }
}
