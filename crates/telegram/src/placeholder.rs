//! Placeholder media URLs.
//!
//! Some feed renderers cannot resolve Telegram media and emit an image source
//! such as `undefined://telegram/channel/furcon_1234` instead. The channel slug
//! and the message id are still recoverable from the path.

/// Channel and message a placeholder points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderRef {
    pub channel: String,
    pub message_id: i64,
}

/// Whether `url` uses the placeholder scheme (scheme or host `undefined`).
pub fn is_placeholder(url: &str) -> bool {
    if url.contains("undefined:") {
        return true;
    }
    url.split_once("://")
        .and_then(|(_, rest)| rest.split('/').next())
        .is_some_and(|host| host == "undefined")
}

/// Recover the channel slug and message id from a placeholder URL.
///
/// The message id is the `_<digits>` suffix of the last path segment; the
/// channel is the non-digit prefix of everything after the `channel`
/// segment. Returns `None` when either part is missing.
pub fn parse_placeholder(url: &str) -> Option<PlaceholderRef> {
    if !is_placeholder(url) {
        return None;
    }
    let parts: Vec<&str> = url.split('/').collect();

    let (_, digits) = parts.last()?.rsplit_once('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let message_id: i64 = digits.parse().ok()?;

    let channel_index = parts.iter().position(|p| *p == "channel")?;
    let tail = parts[channel_index + 1..].join("/");
    let prefix: String = tail.chars().take_while(|c| !c.is_ascii_digit()).collect();
    let channel = prefix
        .trim_end_matches(['_', '/'])
        .replace("telegram/channel/", "")
        .replace("channel/", "");

    if channel.is_empty() {
        return None;
    }
    Some(PlaceholderRef {
        channel,
        message_id,
    })
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("undefined://telegram/channel/furcon_1234", "furcon", 1234)]
    #[case("undefined://channel/furcon_news_42", "furcon_news", 42)]
    #[case("https://undefined/telegram/channel/eventsbot_7", "eventsbot", 7)]
    #[case("undefined:telegram/channel/a_b__99", "a_b", 99)]
    fn recovers_channel_and_id(#[case] url: &str, #[case] channel: &str, #[case] id: i64) {
        assert_eq!(
            parse_placeholder(url),
            Some(PlaceholderRef {
                channel: channel.into(),
                message_id: id,
            })
        );
    }

    #[rstest]
    #[case::no_message_id("undefined://telegram/channel/furcon")]
    #[case::no_channel_segment("undefined://telegram/photo/furcon_12")]
    #[case::digits_only_channel("undefined://telegram/channel/12_34")]
    #[case::not_a_placeholder("https://cdn.example.com/channel/furcon_12")]
    #[case::id_overflow("undefined://channel/x_99999999999999999999999")]
    fn unrecoverable_placeholders(#[case] url: &str) {
        assert_eq!(parse_placeholder(url), None);
    }

    #[test]
    fn detects_placeholder_forms() {
        assert!(is_placeholder("undefined://telegram/channel/x_1"));
        assert!(is_placeholder("http://undefined/telegram/channel/x_1"));
        assert!(!is_placeholder("https://cdn4.telesco.pe/file/abc.jpg"));
        assert!(!is_placeholder("https://example.com/undefined.jpg"));
    }
}
