//! Periodic driver for the health check.
//!
//! Fires [`NetworkHealthCheck::run`] every `period` on the tokio runtime
//! until the shutdown channel flips. A cycle that is already running is
//! never cancelled; shutdown takes effect between cycles.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::watchdog::NetworkHealthCheck;

/// When the health check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub period: Duration,
    /// Wait one period before the first cycle instead of running at once.
    pub initial_delay: bool,
}

impl NetworkHealthCheck {
    /// Run cycles on the configured schedule until `shutdown` changes.
    pub async fn run_periodically(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let Schedule {
            period,
            initial_delay,
        } = self.schedule();

        let first = if initial_delay {
            Instant::now() + period
        } else {
            Instant::now()
        };
        let mut ticker = tokio::time::interval_at(first, period);
        // A slow cycle must not trigger a burst of catch-up cycles.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            period_ms = period.as_millis() as u64,
            initial_delay, "network health check started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    info!("network health check shutting down");
                    break;
                }
            }

            let report = self.run().await;
            debug!(
                healthy = ?report.healthy,
                started = report.started.len(),
                stopped = report.stopped.len(),
                failures = report.failures.len(),
                "health check cycle finished"
            );
        }
    }

    /// Spawn [`run_periodically`](Self::run_periodically) on the current runtime.
    pub fn spawn(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run_periodically(shutdown))
    }
}
