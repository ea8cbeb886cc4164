//! Configuration loading, env substitution, and credential handling.
//!
//! Config files: `tgbridge.toml`, `tgbridge.yaml`, or `tgbridge.json`
//! Searched in `./` then `~/.config/tgbridge/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values. Platform
//! credentials live separately in `keys.json` (see [`credentials`]).

pub mod credentials;
pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    credentials::{Credentials, load_credentials},
    error::{Error, Result},
    loader::{config_dir, discover_and_load, load_config},
    schema::{BridgeConfig, BridgeSection, DiscordConfig, MediaConfig, MetricsConfig},
};
