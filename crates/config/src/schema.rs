/// Config schema types (bridge, discord, media, metrics).
use std::path::PathBuf;

use {
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

/// Feed host serving one RSS document per Telegram channel.
pub const DEFAULT_FEED_URL_TEMPLATE: &str =
    "https://rss.tabithahanegan.com/telegram/channel/{channel}";

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub bridge: BridgeSection,
    pub discord: DiscordConfig,
    pub media: MediaConfig,
    pub metrics: MetricsConfig,
}

/// Polling and persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    /// Directory holding `mappings.json`, `posted_links.json`,
    /// `pending_posts.json`, and `keys.json`.
    pub data_dir: PathBuf,

    /// Feed URL with a `{channel}` placeholder.
    pub feed_url_template: String,

    /// Seconds between poll ticks.
    pub poll_interval_secs: u64,

    /// Pause between two dispatched entries (ms).
    pub entry_delay_ms: u64,

    /// HTTP timeout for a single feed fetch.
    pub feed_timeout_secs: u64,

    /// Abort a whole tick after this many seconds. Unset means no limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick_timeout_secs: Option<u64>,

    /// Source channels whose new posts wait in the pending queue for an
    /// operator instead of being dispatched.
    pub review_channels: Vec<String>,

    /// Override for the credentials file (default `<data_dir>/keys.json`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys_path: Option<PathBuf>,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            feed_url_template: DEFAULT_FEED_URL_TEMPLATE.to_string(),
            poll_interval_secs: 300,
            entry_delay_ms: 1_000,
            feed_timeout_secs: 20,
            tick_timeout_secs: None,
            review_channels: Vec::new(),
            keys_path: None,
        }
    }
}

impl BridgeSection {
    pub fn mappings_path(&self) -> PathBuf {
        self.data_dir.join("mappings.json")
    }

    pub fn posted_links_path(&self) -> PathBuf {
        self.data_dir.join("posted_links.json")
    }

    pub fn pending_posts_path(&self) -> PathBuf {
        self.data_dir.join("pending_posts.json")
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.keys_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("keys.json"))
    }
}

/// Discord bot settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot token. `DISCORD_TOKEN` in the environment takes precedence.
    pub token: Option<Secret<String>>,

    /// Prefix that introduces operator commands in chat (`/telegram ...`).
    pub command_prefix: String,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("command_prefix", &self.command_prefix)
            .finish()
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: None,
            command_prefix: "/".into(),
        }
    }
}

/// Media re-hosting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub imgbb_endpoint: String,
    /// Base URL of Telegram's public post preview pages.
    pub telegram_preview_base: String,
    /// Where downloaded media is staged before upload (system temp dir if unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
    pub download_timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            imgbb_endpoint: "https://api.imgbb.com/1/upload".into(),
            telegram_preview_base: "https://t.me".into(),
            temp_dir: None,
            download_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Address for the Prometheus scrape listener, e.g. `127.0.0.1:9464`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn defaults_poll_every_five_minutes() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.bridge.poll_interval_secs, 300);
        assert_eq!(cfg.bridge.entry_delay_ms, 1_000);
        assert_eq!(cfg.bridge.feed_timeout_secs, 20);
        assert!(cfg.bridge.tick_timeout_secs.is_none());
        assert!(cfg.discord.token.is_none());
    }

    #[test]
    fn default_feed_template_has_a_channel_slot() {
        let section = BridgeSection::default();
        assert!(section.feed_url_template.contains("{channel}"));
    }

    #[test]
    fn data_paths_live_under_data_dir() {
        let section = BridgeSection {
            data_dir: PathBuf::from("/var/lib/tgbridge"),
            ..Default::default()
        };
        assert_eq!(
            section.posted_links_path(),
            PathBuf::from("/var/lib/tgbridge/posted_links.json")
        );
        assert_eq!(
            section.credentials_path(),
            PathBuf::from("/var/lib/tgbridge/keys.json")
        );
    }

    #[test]
    fn deserialize_partial_toml() {
        let raw = r#"
            [bridge]
            poll_interval_secs = 60
            review_channels = ["drafts"]

            [discord]
            token = "abc"
        "#;
        let cfg: BridgeConfig = toml::from_str(raw).unwrap();
        assert_eq!(cfg.bridge.poll_interval_secs, 60);
        assert_eq!(cfg.bridge.review_channels, vec!["drafts".to_string()]);
        assert_eq!(cfg.discord.token.unwrap().expose_secret(), "abc");
        assert_eq!(cfg.media.imgbb_endpoint, "https://api.imgbb.com/1/upload");
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = DiscordConfig {
            token: Some(Secret::new("super-secret".into())),
            ..Default::default()
        };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
