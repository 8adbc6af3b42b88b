use url::Url;

/// Parse a URL the way Telegram does when it highlights links in messages.
///
/// Telegram recognizes URLs without a scheme, like `example.com`, and channel
/// handles like `@amogus`, which lead to `https://t.me/amogus`.
pub fn parse_url_like_telegram(string: &str) -> Result<Url, url::ParseError> {
    if let Some(username) = string.strip_prefix('@') {
        // Probably a handle like "@amogus"
        // Convert to a format like "https://t.me/amogus" then parse
        return Url::parse(&format!("https://t.me/{username}"));
    }

    match Url::parse(string) {
        Ok(url) => Ok(url),
        Err(e @ url::ParseError::RelativeUrlWithoutBase) => {
            // Try prepending https:// to it
            if let Ok(url) = Url::parse(&format!("https://{string}")) {
                Ok(url)
            } else {
                Err(e)
            }
        }
        Err(e) => Err(e),
    }
}

/// Parse a link an admin typed in as a channel's invite link.
/// Only web links to a host are accepted.
pub fn parse_invite_link(string: &str) -> Option<Url> {
    // "@handle" parses fine, but it's a handle, not a link.
    if string.starts_with('@') {
        return None;
    }

    let url = parse_url_like_telegram(string).ok()?;

    // Something like "-1001234567890" parses into "https://-1001234567890/", lol
    let host = url.host_str()?;
    if !matches!(url.scheme(), "http" | "https") || !host.contains('.') {
        return None;
    }

    Some(url)
}

/// Returns `true` if this is a handle like `@amogus`.
pub fn is_channel_handle(string: &str) -> bool {
    let Some(username) = string.strip_prefix('@') else {
        return false;
    };
    !username.is_empty()
        && username
            .chars()
            .all(|x| x.is_ascii_alphanumeric() || x == '_')
}

/// Returns `true` if this looks like a numeric chat ID like `-1001234567890`.
pub fn is_chat_id(string: &str) -> bool {
    string.parse::<i64>().is_ok()
}

/// Produces a link users can open for a channel, given its stored URL and handle.
pub fn canonical_channel_url(url: &str, handle: Option<&str>) -> String {
    if let Ok(url) = parse_url_like_telegram(url) {
        return url.to_string();
    }

    match handle.filter(|x| is_channel_handle(x)) {
        Some(handle) => parse_url_like_telegram(handle)
            .map(|x| x.to_string())
            .unwrap_or_else(|_| url.to_string()),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn parsing_url_like_telegram() {
        let url = parse_url_like_telegram("https://example.com/").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
        let url = parse_url_like_telegram("example.com").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
        let url = parse_url_like_telegram("@amogus").unwrap();
        assert_eq!(url.as_str(), "https://t.me/amogus");
    }

    #[test]
    fn invite_links() {
        assert_eq!(
            parse_invite_link("https://t.me/+AbCdEf").unwrap().as_str(),
            "https://t.me/+AbCdEf"
        );
        assert_eq!(
            parse_invite_link("t.me/joinchat/xyz").unwrap().as_str(),
            "https://t.me/joinchat/xyz"
        );
        assert!(parse_invite_link("@amogus").is_none());
        assert!(parse_invite_link("-1001234567890").is_none());
        assert!(parse_invite_link("Promo").is_none());
        assert!(parse_invite_link("ftp://t.me/x").is_none());
    }

    #[test]
    fn handles_and_chat_ids() {
        assert!(is_channel_handle("@news"));
        assert!(!is_channel_handle("@"));
        assert!(!is_channel_handle("news"));
        assert!(is_channel_handle("@Big_News_2"));
        assert!(!is_channel_handle("@promo/extra"));
        assert!(!is_channel_handle("@@promo"));
        assert!(!is_channel_handle("@новости"));
        assert!(is_chat_id("-1001234567890"));
        assert!(!is_chat_id("@news"));
    }

    #[test]
    fn canonical_urls() {
        assert_eq!(
            canonical_channel_url("t.me/news", Some("@news")),
            "https://t.me/news"
        );
        assert_eq!(canonical_channel_url("@vip", None), "https://t.me/vip");
        assert_eq!(
            canonical_channel_url("not a url", Some("@news")),
            "https://t.me/news"
        );
        assert_eq!(canonical_channel_url("not a url", None), "not a url");
    }
}
