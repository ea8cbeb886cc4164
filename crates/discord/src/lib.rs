//! Discord adapter: embed rendering, outbound delivery through serenity, and
//! the gateway handler that signals readiness and routes operator commands.

pub mod embed;
pub mod handler;
pub mod outbound;
pub mod reply;

pub use {
    embed::to_embed,
    handler::{BridgeHandler, CommandSlot},
    outbound::SerenityOutbound,
};
