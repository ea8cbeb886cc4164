//! Metrics for tgbridge.
//!
//! This crate provides metric names and a recorder setup on top of the
//! `metrics` crate facade. When the `prometheus` feature is enabled, metrics
//! can be scraped from an HTTP listener.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tgbridge_metrics::{bridge, counter};
//!
//! counter!(bridge::ENTRIES_DISPATCHED_TOTAL, "channel" => "news").increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
