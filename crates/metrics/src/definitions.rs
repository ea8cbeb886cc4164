//! Metric name and label definitions.

/// Feed polling and dispatch
pub mod bridge {
    /// Completed poll ticks
    pub const TICKS_TOTAL: &str = "tgbridge_ticks_total";
    /// Wall time of one poll tick in seconds
    pub const TICK_DURATION_SECONDS: &str = "tgbridge_tick_duration_seconds";
    /// Feed fetch or parse failures
    pub const FEED_FAILURES_TOTAL: &str = "tgbridge_feed_failures_total";
    /// Entries delivered to a destination channel
    pub const ENTRIES_DISPATCHED_TOTAL: &str = "tgbridge_entries_dispatched_total";
    /// Entries that failed formatting or delivery
    pub const ENTRY_ERRORS_TOTAL: &str = "tgbridge_entry_errors_total";
    /// Entries held in the pending queue for review
    pub const ENTRIES_HELD_TOTAL: &str = "tgbridge_entries_held_total";
    /// Announcement publishes that failed
    pub const PUBLISH_FAILURES_TOTAL: &str = "tgbridge_publish_failures_total";
}

/// Placeholder media re-hosting
pub mod media {
    /// Placeholder images successfully re-hosted
    pub const RESOLVED_TOTAL: &str = "tgbridge_media_resolved_total";
    /// Placeholder images dropped
    pub const DROPPED_TOTAL: &str = "tgbridge_media_dropped_total";
}

/// Pending queue operator commands
pub mod pending {
    /// Pending posts currently queued
    pub const QUEUED: &str = "tgbridge_pending_queued";
    /// Pending posts released by an operator
    pub const RELEASED_TOTAL: &str = "tgbridge_pending_released_total";
    /// Pending posts discarded by `clear`
    pub const CLEARED_TOTAL: &str = "tgbridge_pending_cleared_total";
}

/// Common label keys
pub mod labels {
    pub const CHANNEL: &str = "channel";
    pub const REASON: &str = "reason";
}
