use std::sync::Arc;

use {
    async_trait::async_trait,
    serenity::all::{
        Cache, CacheHttp, Channel, ChannelId, ChannelType, CreateMessage, GuildChannel, Http,
        MessageId, UserId,
    },
    tracing::debug,
};

use {
    tgbridge_channels::{
        ChatOutbound, Destination, DestinationKind, Error, MessageHandle, Result,
    },
    tgbridge_common::types::FormattedMessage,
};

use crate::embed::to_embed;

/// Delivers bridged posts through serenity's REST client.
///
/// Serenity's HTTP layer waits out 429 responses on its own, so calls here
/// only fail for non-retryable errors.
pub struct SerenityOutbound {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl SerenityOutbound {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }

    fn cache_http(&self) -> (&Arc<Cache>, &Http) {
        (&self.cache, self.http.as_ref())
    }
}

/// Parse a snowflake id. Discord ids are never zero.
pub(crate) fn parse_snowflake(raw: &str) -> Result<u64> {
    let id: u64 = raw.trim().parse()?;
    if id == 0 {
        return Err(Error::invalid_input(format!("invalid snowflake id: {raw}")));
    }
    Ok(id)
}

/// Whether `user_id` holds manage-messages in `channel`, per the cached guild
/// roles and the channel's permission overwrites.
pub(crate) async fn can_manage_messages(
    cache_http: impl CacheHttp,
    cache: &Cache,
    channel: &GuildChannel,
    user_id: UserId,
) -> bool {
    let member = match channel.guild_id.member(cache_http, user_id).await {
        Ok(member) => member,
        Err(e) => {
            debug!(channel_id = %channel.id, user_id = %user_id, error = %e, "member lookup failed");
            return false;
        },
    };
    cache
        .guild(channel.guild_id)
        .is_some_and(|guild| guild.user_permissions_in(channel, &member).manage_messages())
}

pub(crate) fn destination_kind(channel: &GuildChannel) -> DestinationKind {
    if channel.kind == ChannelType::News {
        DestinationKind::Announcement
    } else {
        DestinationKind::Text
    }
}

#[async_trait]
impl ChatOutbound for SerenityOutbound {
    async fn resolve(&self, channel_id: &str) -> Result<Option<Destination>> {
        let id = ChannelId::new(parse_snowflake(channel_id)?);
        let channel = id
            .to_channel(self.cache_http())
            .await
            .map_err(|e| Error::external(format!("fetch channel {channel_id}"), e))?;
        let Channel::Guild(channel) = channel else {
            return Ok(None);
        };

        let me = self.cache.current_user().id;
        let can_manage_messages =
            can_manage_messages(self.cache_http(), &self.cache, &channel, me).await;
        Ok(Some(Destination {
            channel_id: channel.id.to_string(),
            name: channel.name.clone(),
            kind: destination_kind(&channel),
            can_manage_messages,
        }))
    }

    async fn send(&self, to: &Destination, message: &FormattedMessage) -> Result<MessageHandle> {
        let id = ChannelId::new(parse_snowflake(&to.channel_id)?);
        let sent = id
            .send_message(self.cache_http(), CreateMessage::new().embed(to_embed(message)))
            .await
            .map_err(|e| Error::external(format!("send to {}", to.channel_id), e))?;
        debug!(channel_id = %to.channel_id, message_id = %sent.id, "message sent");
        Ok(MessageHandle {
            channel_id: to.channel_id.clone(),
            message_id: sent.id.to_string(),
        })
    }

    async fn publish(&self, handle: &MessageHandle) -> Result<()> {
        let channel = ChannelId::new(parse_snowflake(&handle.channel_id)?);
        let message = MessageId::new(parse_snowflake(&handle.message_id)?);
        channel
            .crosspost(&self.http, message)
            .await
            .map_err(|e| Error::external(format!("crosspost {}", handle.message_id), e))?;
        debug!(channel_id = %handle.channel_id, message_id = %handle.message_id, "message published");
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_snowflakes() {
        assert_eq!(parse_snowflake("1234567890").unwrap(), 1_234_567_890);
        assert_eq!(parse_snowflake(" 42 ").unwrap(), 42);
    }

    #[test]
    fn rejects_zero_and_garbage() {
        assert!(matches!(
            parse_snowflake("0"),
            Err(Error::InvalidInput { .. })
        ));
        assert!(matches!(
            parse_snowflake("general"),
            Err(Error::ParseInt(_))
        ));
    }
}
