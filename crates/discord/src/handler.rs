//! Discord event handler for serenity.
//!
//! Signals gateway readiness to the poll scheduler and routes prefixed
//! operator commands to the pending-queue command sink.

use std::sync::{Arc, OnceLock};

use {
    serenity::{
        all::{Channel, Context, EventHandler, GatewayIntents, GuildId, Message, Ready},
        async_trait,
    },
    tokio::sync::watch,
    tracing::{debug, info, warn},
};

use tgbridge_channels::{CommandContext, CommandSink};

use crate::{
    outbound::can_manage_messages,
    reply::{DISCORD_MAX_MESSAGE_LEN, chunk_reply},
};

/// Command sink installed once the outbound side exists.
pub type CommandSlot = Arc<OnceLock<Arc<dyn CommandSink>>>;

/// Handler for Discord gateway events.
pub struct BridgeHandler {
    command_prefix: String,
    commands: CommandSlot,
    ready: watch::Sender<bool>,
}

impl BridgeHandler {
    pub fn new(
        command_prefix: impl Into<String>,
        commands: CommandSlot,
        ready: watch::Sender<bool>,
    ) -> Self {
        Self {
            command_prefix: command_prefix.into(),
            commands,
            ready,
        }
    }

    /// Required gateway intents for the bot.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT
    }
}

/// The command line after `prefix`, or `None` for ordinary chat.
pub fn command_line<'a>(content: &'a str, prefix: &str) -> Option<&'a str> {
    let line = content.trim().strip_prefix(prefix)?.trim();
    (!line.is_empty()).then_some(line)
}

async fn invoker_can_manage_messages(ctx: &Context, msg: &Message) -> bool {
    if msg.guild_id.is_none() {
        return false;
    }
    match msg.channel_id.to_channel(ctx).await {
        Ok(Channel::Guild(channel)) => {
            can_manage_messages(ctx, &ctx.cache, &channel, msg.author.id).await
        },
        Ok(_) => false,
        Err(e) => {
            debug!(channel_id = %msg.channel_id, error = %e, "failed to fetch command channel");
            false
        },
    }
}

#[async_trait]
impl EventHandler for BridgeHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            bot_name = %ready.user.name,
            guilds = ready.guilds.len(),
            "discord bot ready"
        );
        self.ready.send_replace(true);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Skip bot messages to prevent loops
        if msg.author.bot {
            return;
        }
        let Some(line) = command_line(&msg.content, &self.command_prefix) else {
            return;
        };
        let Some(sink) = self.commands.get() else {
            debug!("command received before the bridge finished starting");
            return;
        };

        let command = CommandContext {
            channel_id: msg.channel_id.to_string(),
            invoker: msg.author.name.clone(),
            can_manage_messages: invoker_can_manage_messages(&ctx, &msg).await,
        };
        let Some(response) = sink.dispatch_command(line, command).await else {
            return;
        };

        for chunk in chunk_reply(&response, DISCORD_MAX_MESSAGE_LEN) {
            if let Err(e) = msg.reply(&ctx.http, chunk).await {
                warn!(error = %e, "failed to send command response");
                break;
            }
        }
    }

    async fn cache_ready(&self, _ctx: Context, guilds: Vec<GuildId>) {
        debug!(guild_count = guilds.len(), "discord cache ready");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_prefixed_commands() {
        assert_eq!(
            command_line("/telegram pending furcon", "/"),
            Some("telegram pending furcon")
        );
        assert_eq!(command_line("  !telegram  ", "!"), Some("telegram"));
    }

    #[test]
    fn ignores_plain_chat() {
        assert_eq!(command_line("hello there", "/"), None);
        assert_eq!(command_line("/", "/"), None);
    }

    #[test]
    fn requests_message_content_intent() {
        assert!(BridgeHandler::intents().contains(GatewayIntents::MESSAGE_CONTENT));
    }
}
