//! Operator commands over the pending queue: list, publish, clear.

use std::{fmt::Write as _, sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    tgbridge_channels::{ChatOutbound, CommandContext, CommandSink, DestinationKind},
    tracing::{info, warn},
};

#[cfg(feature = "metrics")]
use tgbridge_metrics::{counter, gauge, labels, pending as pending_metrics};

use crate::store::{BridgeStore, PendingPost, SharedStore};

const USAGE: &str = "Please specify a subcommand. Use `help telegram` for more information.";
const PERMISSION_DENIED: &str = "You need the Manage Messages permission to manage Telegram posts.";

/// Why a queue command was refused. The display text is the operator reply.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("No pending posts found for channel {0}")]
    UnknownChannel(String),

    #[error("No pending posts available for {0}")]
    Empty(String),

    #[error("failed to persist the pending queue: {0}")]
    Store(#[from] crate::Error),
}

/// Result of one `publish` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Posts taken off the queue.
    pub released: usize,
    /// Posts delivered and recorded as posted.
    pub delivered: usize,
    /// Posts that could not be delivered. They are consumed all the same.
    pub failed: usize,
}

impl PublishOutcome {
    /// Operator reply for a finished `publish`.
    pub fn summary(&self, channel: &str) -> String {
        let mut reply = format!("Published {} posts for {channel}", self.delivered);
        if self.failed > 0 {
            let _ = write!(reply, " ({} could not be delivered and were dropped)", self.failed);
        }
        reply
    }
}

pub struct PendingCommands {
    store: SharedStore,
    outbound: Arc<dyn ChatOutbound>,
    entry_delay: Duration,
}

impl PendingCommands {
    pub fn new(store: SharedStore, outbound: Arc<dyn ChatOutbound>, entry_delay: Duration) -> Self {
        Self {
            store,
            outbound,
            entry_delay,
        }
    }

    /// Human-readable listing of one queue, or of every non-empty queue.
    pub async fn list(&self, channel: Option<&str>) -> String {
        let store = self.store.lock().await;
        match channel {
            Some(name) => match store.pending(name) {
                None => QueueError::UnknownChannel(name.to_string()).to_string(),
                Some([]) => QueueError::Empty(name.to_string()).to_string(),
                Some(posts) => render_queue(name, posts),
            },
            None => {
                let sections: Vec<String> = store
                    .pending_queues()
                    .filter(|(_, posts)| !posts.is_empty())
                    .map(|(name, posts)| render_queue(name, posts))
                    .collect();
                if sections.is_empty() {
                    "No pending posts".to_string()
                } else {
                    sections.join("\n\n")
                }
            },
        }
    }

    /// Release up to `count` posts from the front of the queue of `channel`.
    ///
    /// Every taken post is consumed and attempted, even when an earlier one
    /// fails. Only delivered posts are recorded as posted. The queue and
    /// posted-link documents are written once at the end.
    pub async fn publish(&self, channel: &str, count: usize) -> Result<PublishOutcome, QueueError> {
        let mut store = self.store.lock().await;
        match store.pending(channel) {
            None => return Err(QueueError::UnknownChannel(channel.to_string())),
            Some([]) => return Err(QueueError::Empty(channel.to_string())),
            Some(_) => {},
        }
        let batch = store.take_pending(channel, count.max(1)).unwrap_or_default();
        let mut outcome = PublishOutcome {
            released: batch.len(),
            ..Default::default()
        };

        let last = batch.len().saturating_sub(1);
        for (i, post) in batch.into_iter().enumerate() {
            match self.deliver(&post).await {
                Ok(()) => {
                    store.add_posted_link(channel, &post.link);
                    outcome.delivered += 1;
                },
                Err(e) => {
                    warn!(
                        channel = %channel,
                        link = %post.link,
                        error = %e,
                        "failed to release pending post, dropping it"
                    );
                    outcome.failed += 1;
                },
            }
            if i < last && !self.entry_delay.is_zero() {
                tokio::time::sleep(self.entry_delay).await;
            }
        }

        store.save_pending_posts().await?;
        store.save_posted_links().await?;
        record_queue_depth(&store, channel);
        #[cfg(feature = "metrics")]
        counter!(pending_metrics::RELEASED_TOTAL, labels::CHANNEL => channel.to_string())
            .increment(outcome.delivered as u64);

        info!(
            channel = %channel,
            released = outcome.released,
            delivered = outcome.delivered,
            failed = outcome.failed,
            "pending posts released"
        );
        Ok(outcome)
    }

    /// Drop every post queued for `channel`. Returns how many were dropped.
    pub async fn clear(&self, channel: &str) -> Result<usize, QueueError> {
        let mut store = self.store.lock().await;
        let cleared = store
            .clear_pending(channel)
            .await?
            .ok_or_else(|| QueueError::UnknownChannel(channel.to_string()))?;
        record_queue_depth(&store, channel);
        #[cfg(feature = "metrics")]
        counter!(pending_metrics::CLEARED_TOTAL, labels::CHANNEL => channel.to_string())
            .increment(cleared as u64);
        info!(channel = %channel, cleared, "pending queue cleared");
        Ok(cleared)
    }

    /// Send one stored post to its recorded destination, crossposting in
    /// announcement channels.
    async fn deliver(&self, post: &PendingPost) -> tgbridge_channels::Result<()> {
        let destination = self
            .outbound
            .resolve(&post.channel_id)
            .await?
            .ok_or_else(|| tgbridge_channels::Error::unknown_destination(&post.channel_id))?;
        let handle = self.outbound.send(&destination, &post.message).await?;
        if destination.should_publish() {
            if let Err(e) = self.outbound.publish(&handle).await {
                warn!(destination = %destination.name, error = %e, "failed to publish released post");
            }
        } else if destination.kind == DestinationKind::Announcement {
            warn!(destination = %destination.name, "missing manage-messages permission, not publishing");
        }
        Ok(())
    }

    /// Run one `telegram ...` command line and build the reply.
    async fn execute(&self, args: &[&str]) -> String {
        match args {
            [] => USAGE.to_string(),
            ["pending"] => self.list(None).await,
            ["pending", channel] => self.list(Some(*channel)).await,
            ["publish", channel] | ["publish", channel, _] => {
                let count = match args.get(2) {
                    Some(raw) => match raw.parse::<usize>() {
                        Ok(n) if n > 0 => n,
                        _ => return format!("Invalid count `{raw}`: expected a positive number"),
                    },
                    None => 1,
                };
                match self.publish(channel, count).await {
                    Ok(outcome) => outcome.summary(channel),
                    Err(e) => e.to_string(),
                }
            },
            ["clear", channel] => match self.clear(channel).await {
                Ok(cleared) => format!("Cleared {cleared} pending posts for {channel}"),
                Err(e) => e.to_string(),
            },
            ["publish"] => "Usage: telegram publish <channel> [count]".to_string(),
            ["clear"] => "Usage: telegram clear <channel>".to_string(),
            _ => USAGE.to_string(),
        }
    }
}

#[async_trait]
impl CommandSink for PendingCommands {
    async fn dispatch_command(&self, line: &str, ctx: CommandContext) -> Option<String> {
        let mut words = line.split_whitespace();
        if words.next()? != "telegram" {
            return None;
        }
        if !ctx.can_manage_messages {
            info!(invoker = %ctx.invoker, "telegram command refused, missing permission");
            return Some(PERMISSION_DENIED.to_string());
        }
        let args: Vec<&str> = words.collect();
        Some(self.execute(&args).await)
    }
}

fn render_queue(channel: &str, posts: &[PendingPost]) -> String {
    let mut out = format!("**Pending posts for {channel}**");
    for (i, post) in posts.iter().enumerate() {
        let _ = write!(
            out,
            "\n\nPost #{}\nPosted at: {}\nLink: {}",
            i + 1,
            post.post_date.format("%Y-%m-%d %H:%M UTC"),
            post.link
        );
    }
    out
}

#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
fn record_queue_depth(store: &BridgeStore, channel: &str) {
    #[cfg(feature = "metrics")]
    {
        let queued = store.pending(channel).map_or(0, <[PendingPost]>::len);
        gauge!(pending_metrics::QUEUED, labels::CHANNEL => channel.to_string()).set(queued as f64);
    }
}
