//! Chat platform seam.
//!
//! A chat adapter (Discord today) implements [`ChatOutbound`] to receive
//! bridged posts, and forwards operator commands to a [`CommandSink`].

pub mod error;
pub mod plugin;

pub use {
    error::{Error, Result},
    plugin::{
        ChatOutbound, CommandContext, CommandSink, Destination, DestinationKind, MessageHandle,
    },
};
