//! Offline access to the pending-post queue.

use std::{sync::Arc, time::Duration};

use {
    anyhow::{Context as _, Result},
    clap::Subcommand,
    secrecy::ExposeSecret,
    serenity::all::{Cache, Http},
    tgbridge_bridge::{BridgeStore, PendingCommands},
    tgbridge_channels::ChatOutbound,
    tgbridge_config::BridgeConfig,
    tgbridge_discord::SerenityOutbound,
};

#[derive(Subcommand)]
pub enum PendingAction {
    /// List queued posts for one source channel, or for all of them.
    List {
        /// Source channel name.
        channel: Option<String>,
    },
    /// Send the oldest queued posts of a source channel to Discord.
    Publish {
        /// Source channel name.
        channel: String,
        /// How many posts to release.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,
    },
    /// Drop every queued post of a source channel.
    Clear {
        /// Source channel name.
        channel: String,
    },
}

pub async fn handle_pending(action: PendingAction, config: &BridgeConfig) -> Result<()> {
    let store = BridgeStore::open(&config.bridge).await?.into_shared();

    match action {
        PendingAction::List { channel } => {
            let commands = PendingCommands::new(store, rest_outbound(""), Duration::ZERO);
            println!("{}", commands.list(channel.as_deref()).await);
        },
        PendingAction::Publish { channel, count } => {
            let token = config
                .discord
                .token
                .as_ref()
                .context("publishing needs a Discord token (set DISCORD_TOKEN or [discord].token)")?;
            let commands = PendingCommands::new(
                store,
                rest_outbound(token.expose_secret()),
                Duration::from_millis(config.bridge.entry_delay_ms),
            );
            let outcome = commands.publish(&channel, count as usize).await?;
            println!("{}", outcome.summary(&channel));
        },
        PendingAction::Clear { channel } => {
            let commands = PendingCommands::new(store, rest_outbound(""), Duration::ZERO);
            let cleared = commands.clear(&channel).await?;
            println!("Cleared {cleared} pending posts for {channel}");
        },
    }

    Ok(())
}

/// REST-only Discord client. Without a gateway the cache stays empty, so
/// announcement channels are never crossposted from here.
fn rest_outbound(token: &str) -> Arc<dyn ChatOutbound> {
    Arc::new(SerenityOutbound::new(
        Arc::new(Http::new(token)),
        Arc::new(Cache::new()),
    ))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.bridge.data_dir = dir.to_path_buf();
        config
    }

    #[tokio::test]
    async fn clear_empties_the_queue_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("mappings.json"), r#"{"furcon": "100"}"#).unwrap();
        std::fs::write(
            tmp.path().join("pending_posts.json"),
            r#"{"furcon": [{
                "post_date": "2024-05-01T12:10:00Z",
                "link": "https://t.me/furcon/1",
                "channel_id": "100",
                "message": {"author_name": "Telegram | Furcon", "author_icon_url": ""}
            }]}"#,
        )
        .unwrap();
        let config = config_in(tmp.path());

        handle_pending(
            PendingAction::Clear {
                channel: "furcon".into(),
            },
            &config,
        )
        .await
        .unwrap();

        let store = BridgeStore::open(&config.bridge).await.unwrap();
        assert!(store.pending("furcon").unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_channels_are_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        let err = handle_pending(
            PendingAction::Clear {
                channel: "ghost".into(),
            },
            &config,
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "No pending posts found for channel ghost");
    }

    #[tokio::test]
    async fn publish_requires_a_token() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        let err = handle_pending(
            PendingAction::Publish {
                channel: "furcon".into(),
                count: 1,
            },
            &config,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Discord token"));
    }
}
