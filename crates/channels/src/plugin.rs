use {async_trait::async_trait, tgbridge_common::types::FormattedMessage};

use crate::Result;

/// What kind of chat channel a destination is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    /// Plain text channel.
    Text,
    /// Announcement channel whose messages can be published to followers.
    Announcement,
}

/// A resolved destination channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub channel_id: String,
    pub name: String,
    pub kind: DestinationKind,
    /// Whether the bot holds the manage-messages permission here.
    pub can_manage_messages: bool,
}

impl Destination {
    /// Announcement channels get a follow-up publish when the bot may do so.
    #[must_use]
    pub fn should_publish(&self) -> bool {
        self.kind == DestinationKind::Announcement && self.can_manage_messages
    }
}

/// Handle to a delivered message, usable for a follow-up publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    pub channel_id: String,
    pub message_id: String,
}

/// Send bridged posts to a chat platform.
#[async_trait]
pub trait ChatOutbound: Send + Sync {
    /// Look up a destination channel. `Ok(None)` means the channel is unknown
    /// or not visible to the bot.
    async fn resolve(&self, channel_id: &str) -> Result<Option<Destination>>;

    /// Deliver one formatted message.
    async fn send(&self, to: &Destination, message: &FormattedMessage) -> Result<MessageHandle>;

    /// Publish (crosspost) a delivered message from an announcement channel.
    async fn publish(&self, handle: &MessageHandle) -> Result<()>;
}

/// Who invoked a chat command and where to answer.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub channel_id: String,
    pub invoker: String,
    /// Permission check already done by the chat adapter.
    pub can_manage_messages: bool,
}

/// Receives operator commands parsed out of chat messages.
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Execute a command line (without the prefix) and return the reply
    /// text, or `None` when the line is not addressed to this sink.
    async fn dispatch_command(&self, line: &str, ctx: CommandContext) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest(kind: DestinationKind, can_manage_messages: bool) -> Destination {
        Destination {
            channel_id: "1".into(),
            name: "news".into(),
            kind,
            can_manage_messages,
        }
    }

    #[test]
    fn only_permitted_announcement_channels_publish() {
        assert!(dest(DestinationKind::Announcement, true).should_publish());
        assert!(!dest(DestinationKind::Announcement, false).should_publish());
        assert!(!dest(DestinationKind::Text, true).should_publish());
    }
}
