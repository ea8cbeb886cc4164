//! One poll tick: fetch every mapped feed, diff against the store, dispatch
//! new posts oldest first.

use std::{collections::HashSet, sync::Arc, time::Duration};

use {
    tgbridge_channels::{ChatOutbound, Destination, DestinationKind},
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use tgbridge_metrics::{bridge as bridge_metrics, counter, gauge, labels, pending as pending_metrics};

use crate::{
    Result,
    feed::{FeedEntry, FeedSource},
    format::PostFormatter,
    store::{PendingPost, SharedStore},
};

/// Counts from one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub sources: usize,
    pub skipped_sources: usize,
    pub dispatched: usize,
    pub held: usize,
    pub failed_entries: usize,
}

impl TickReport {
    fn absorb(&mut self, other: &TickReport) {
        self.dispatched += other.dispatched;
        self.held += other.held;
        self.failed_entries += other.failed_entries;
    }
}

pub struct Pipeline {
    store: SharedStore,
    feeds: Arc<dyn FeedSource>,
    outbound: Arc<dyn ChatOutbound>,
    formatter: Arc<PostFormatter>,
    review_channels: HashSet<String>,
    entry_delay: Duration,
}

impl Pipeline {
    pub fn new(
        store: SharedStore,
        feeds: Arc<dyn FeedSource>,
        outbound: Arc<dyn ChatOutbound>,
        formatter: Arc<PostFormatter>,
    ) -> Self {
        Self {
            store,
            feeds,
            outbound,
            formatter,
            review_channels: HashSet::new(),
            entry_delay: Duration::from_secs(1),
        }
    }

    /// Sources whose new posts go to the pending queue instead of the chat.
    #[must_use]
    pub fn with_review_channels(mut self, channels: impl IntoIterator<Item = String>) -> Self {
        self.review_channels = channels.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_entry_delay(mut self, delay: Duration) -> Self {
        self.entry_delay = delay;
        self
    }

    /// Process every mapped source once, in mapping order. A failing source
    /// never stops the others.
    pub async fn tick(&self) -> TickReport {
        let mappings = self.store.lock().await.mappings().clone();
        let mut report = TickReport {
            sources: mappings.len(),
            ..Default::default()
        };

        for (source, destination_id) in &mappings {
            match self.process_source(source, destination_id).await {
                Ok(Some(source_report)) => report.absorb(&source_report),
                Ok(None) => report.skipped_sources += 1,
                Err(e) => {
                    warn!(channel = %source, error = %e, "feed fetch failed, skipping source");
                    #[cfg(feature = "metrics")]
                    counter!(bridge_metrics::FEED_FAILURES_TOTAL, labels::CHANNEL => source.clone())
                        .increment(1);
                    report.skipped_sources += 1;
                },
            }
        }

        info!(
            sources = report.sources,
            skipped = report.skipped_sources,
            dispatched = report.dispatched,
            held = report.held,
            failed = report.failed_entries,
            "poll tick complete"
        );
        report
    }

    /// `Ok(None)` when the destination cannot be resolved.
    async fn process_source(
        &self,
        source: &str,
        destination_id: &str,
    ) -> Result<Option<TickReport>> {
        let entries = self.feeds.fetch(source).await?;

        let destination = match self.outbound.resolve(destination_id).await {
            Ok(Some(destination)) => destination,
            Ok(None) => {
                warn!(channel = %source, destination = destination_id, "destination channel not found");
                return Ok(None);
            },
            Err(e) => {
                warn!(channel = %source, destination = destination_id, error = %e, "failed to resolve destination");
                return Ok(None);
            },
        };

        let new_entries = self.new_entries(source, entries).await;
        debug!(channel = %source, count = new_entries.len(), "new feed entries");

        let held = self.review_channels.contains(source);
        let mut report = TickReport::default();
        for entry in new_entries {
            let outcome = if held {
                self.hold(source, &destination, &entry).await
            } else {
                self.dispatch(source, &destination, &entry).await
            };
            match outcome {
                Ok(()) if held => report.held += 1,
                Ok(()) => {
                    report.dispatched += 1;
                    tokio::time::sleep(self.entry_delay).await;
                },
                Err(e) => {
                    warn!(channel = %source, link = %entry.link, error = %e, "failed to process entry");
                    #[cfg(feature = "metrics")]
                    counter!(bridge_metrics::ENTRY_ERRORS_TOTAL, labels::CHANNEL => source.to_string())
                        .increment(1);
                    report.failed_entries += 1;
                },
            }
        }
        Ok(Some(report))
    }

    /// Entries not yet posted nor pending, with a timestamp, oldest first.
    async fn new_entries(&self, source: &str, entries: Vec<FeedEntry>) -> Vec<FeedEntry> {
        let store = self.store.lock().await;
        let mut fresh: Vec<FeedEntry> = entries
            .into_iter()
            .filter(|e| {
                if e.published.is_none() {
                    debug!(channel = %source, link = %e.link, "entry has no timestamp, ignoring it");
                    return false;
                }
                !store.is_posted(source, &e.link) && !store.is_pending(source, &e.link)
            })
            .collect();
        drop(store);
        fresh.sort_by_key(|e| e.published);
        let mut seen = HashSet::new();
        fresh.retain(|e| seen.insert(e.link.clone()));
        fresh
    }

    async fn dispatch(
        &self,
        source: &str,
        destination: &Destination,
        entry: &FeedEntry,
    ) -> Result<()> {
        let message = self.formatter.format(entry, source).await;
        let handle = self.outbound.send(destination, &message).await?;

        if destination.should_publish() {
            if let Err(e) = self.outbound.publish(&handle).await {
                warn!(
                    channel = %source,
                    destination = %destination.name,
                    error = %e,
                    "failed to publish in announcement channel"
                );
                #[cfg(feature = "metrics")]
                counter!(bridge_metrics::PUBLISH_FAILURES_TOTAL, labels::CHANNEL => source.to_string())
                    .increment(1);
            }
        } else if destination.kind == DestinationKind::Announcement {
            warn!(
                channel = %source,
                destination = %destination.name,
                "missing manage-messages permission, not publishing"
            );
        }

        self.store
            .lock()
            .await
            .record_posted(source, &entry.link)
            .await?;
        #[cfg(feature = "metrics")]
        counter!(bridge_metrics::ENTRIES_DISPATCHED_TOTAL, labels::CHANNEL => source.to_string())
            .increment(1);
        debug!(channel = %source, link = %entry.link, "entry dispatched");
        Ok(())
    }

    async fn hold(&self, source: &str, destination: &Destination, entry: &FeedEntry) -> Result<()> {
        let Some(post_date) = entry.published else {
            return Ok(());
        };
        let message = self.formatter.format(entry, source).await;
        let post = PendingPost {
            post_date,
            link: entry.link.clone(),
            channel_id: destination.channel_id.clone(),
            message,
        };
        let mut store = self.store.lock().await;
        store.enqueue_pending(source, post).await?;
        #[cfg(feature = "metrics")]
        {
            counter!(bridge_metrics::ENTRIES_HELD_TOTAL, labels::CHANNEL => source.to_string())
                .increment(1);
            let queued = store.pending(source).map_or(0, <[PendingPost]>::len);
            gauge!(pending_metrics::QUEUED, labels::CHANNEL => source.to_string()).set(queued as f64);
        }
        debug!(channel = %source, link = %entry.link, "entry held for review");
        Ok(())
    }
}
