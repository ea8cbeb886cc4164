//! Fixed-interval driver for the poll pipeline.

use std::{sync::Arc, time::Duration};

use {
    tokio::{
        sync::watch,
        task::JoinHandle,
        time::{Instant, MissedTickBehavior},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use tgbridge_metrics::{bridge as bridge_metrics, counter, histogram};

use crate::pipeline::Pipeline;

/// Runs [`Pipeline::tick`] on a fixed interval once the chat client is ready.
///
/// Ticks run one after another in a single task, so they never overlap. A tick
/// that outlives the interval delays the next one instead of stacking up.
pub struct PollScheduler {
    pipeline: Arc<Pipeline>,
    interval: Duration,
    tick_timeout: Option<Duration>,
}

impl PollScheduler {
    pub fn new(pipeline: Arc<Pipeline>, interval: Duration) -> Self {
        Self {
            pipeline,
            interval,
            tick_timeout: None,
        }
    }

    /// Abandon a tick that runs longer than `timeout`.
    #[must_use]
    pub fn with_tick_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tick_timeout = timeout;
        self
    }

    /// Spawn the timer loop. It ends when `cancel` fires or the readiness
    /// sender is dropped before signalling.
    pub fn spawn(self, ready: watch::Receiver<bool>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(ready, cancel).await })
    }

    pub async fn run(self, mut ready: watch::Receiver<bool>, cancel: CancellationToken) {
        tokio::select! {
            result = ready.wait_for(|r| *r) => {
                if result.is_err() {
                    warn!("readiness signal dropped before the chat client was ready");
                    return;
                }
            },
            () = cancel.cancelled() => return,
        }
        info!(interval_secs = self.interval.as_secs(), "poll scheduler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {},
                () = cancel.cancelled() => break,
            }
            tokio::select! {
                () = self.run_tick() => {},
                () = cancel.cancelled() => break,
            }
        }
        info!("poll scheduler stopped");
    }

    async fn run_tick(&self) {
        let started = Instant::now();
        match self.tick_timeout {
            Some(limit) => {
                if tokio::time::timeout(limit, self.pipeline.tick()).await.is_err() {
                    warn!(timeout_secs = limit.as_secs(), "poll tick timed out");
                }
            },
            None => {
                self.pipeline.tick().await;
            },
        }
        let elapsed = started.elapsed();
        debug!(elapsed_ms = elapsed.as_millis() as u64, "poll tick finished");

        #[cfg(feature = "metrics")]
        {
            counter!(bridge_metrics::TICKS_TOTAL).increment(1);
            histogram!(bridge_metrics::TICK_DURATION_SECONDS).record(elapsed.as_secs_f64());
        }
    }
}
