use teloxide::types::{Message, User};

pub trait MessageStuff {
    /// Text of the message, or its caption if it's a media message.
    fn text_full(&self) -> Option<&str>;
}

impl MessageStuff for Message {
    fn text_full(&self) -> Option<&str> {
        self.text().or_else(|| self.caption())
    }
}

pub trait UserStuff {
    /// Either `@username` or the full name of the user, optionally followed by their ID.
    fn pretty_name(&self, with_id: bool) -> String;
    /// Username of the user as `@username`, if they have one.
    fn handle(&self) -> Option<String>;
}

impl UserStuff for User {
    fn pretty_name(&self, with_id: bool) -> String {
        let name = self.handle().unwrap_or_else(|| self.full_name());

        if with_id {
            format!("{name} (userid {})", self.id)
        } else {
            name
        }
    }

    fn handle(&self) -> Option<String> {
        self.username
            .as_ref()
            .map(|username| format!("@{username}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: Option<&str>) -> User {
        let mut json = serde_json::json!({
            "id": 1366743555u64,
            "is_bot": false,
            "first_name": "Ada",
            "last_name": "Lovelace",
        });
        if let Some(username) = username {
            json["username"] = username.into();
        }
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn pretty_name_prefers_username() {
        assert_eq!(user(Some("ada")).pretty_name(false), "@ada");
        assert_eq!(user(None).pretty_name(false), "Ada Lovelace");
        assert_eq!(
            user(None).pretty_name(true),
            "Ada Lovelace (userid 1366743555)"
        );
    }

    #[test]
    fn handle_is_prefixed() {
        assert_eq!(user(Some("ada")).handle().as_deref(), Some("@ada"));
        assert_eq!(user(None).handle(), None);
    }
}
