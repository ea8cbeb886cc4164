//! Destination-agnostic message types shared by the bridge and chat adapters.

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// Telegram brand colour used for every bridged post.
pub const TELEGRAM_COLOR: u32 = 0x0088cc;

/// Icon shown next to the author label and the forward footer.
pub const TELEGRAM_ICON_URL: &str = "https://telegram.org/img/t_logo.png";

/// Footer line of a formatted message (e.g. "Forwarded from X").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFooter {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// A rendered post, ready to hand to any chat outbound.
///
/// This is also the payload stored with pending posts, so its serialized
/// shape is part of `pending_posts.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedMessage {
    pub author_name: String,
    pub author_icon_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<MessageFooter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default = "default_color")]
    pub color: u32,
}

fn default_color() -> u32 {
    TELEGRAM_COLOR
}

impl FormattedMessage {
    /// Start a message with the given author label and the Telegram icon.
    pub fn new(author_name: impl Into<String>) -> Self {
        Self {
            author_name: author_name.into(),
            author_icon_url: TELEGRAM_ICON_URL.to_string(),
            description: None,
            image_url: None,
            footer: None,
            timestamp: None,
            color: TELEGRAM_COLOR,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_color_defaults_to_telegram_blue() {
        let json = r#"{"author_name":"Telegram | News","author_icon_url":"x"}"#;
        let msg: FormattedMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.color, TELEGRAM_COLOR);
        assert!(msg.description.is_none());
        assert!(msg.footer.is_none());
    }

    #[test]
    fn optional_fields_are_omitted() {
        let msg = FormattedMessage::new("Telegram | News");
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("image_url").is_none());
        assert!(value.get("timestamp").is_none());
        assert_eq!(value["author_icon_url"], TELEGRAM_ICON_URL);
    }
}
