//! The Telegram-to-chat bridge: feed fetching, text normalization, post
//! formatting, the dedup/pending store, the poll pipeline and its scheduler,
//! and the operator commands over the pending queue.

pub mod error;
pub mod feed;
pub mod format;
pub mod normalize;
pub mod pending;
pub mod pipeline;
pub mod scheduler;
pub mod store;

pub use {
    error::{Error, Result},
    feed::{FeedEntry, FeedSource, HttpFeedSource},
    format::PostFormatter,
    normalize::{ImageRef, Normalized, Normalizer, is_spaced_text},
    pending::{PendingCommands, PublishOutcome, QueueError},
    pipeline::{Pipeline, TickReport},
    scheduler::PollScheduler,
    store::{BridgeStore, PendingPost, SharedStore},
};
