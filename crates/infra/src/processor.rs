//! Periodic background loop reserved for event maintenance work.
//!
//! Each tick currently does nothing beyond logging and counting; retrying failed
//! deliveries or sweeping dead letters would hook in here.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::EventsConfig;

#[derive(Debug, Clone)]
pub struct BackgroundEventProcessor {
    period: Duration,
    ticks: Arc<AtomicU64>,
}

impl BackgroundEventProcessor {
    pub fn new(period: Duration) -> Self {
        Self {
            // tokio intervals panic on a zero period.
            period: period.max(Duration::from_millis(1)),
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_config(config: &EventsConfig) -> Self {
        Self::new(config.processor_interval())
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks completed so far, across all clones.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Run until `cancel` fires. The first tick happens one period after the start.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(period_secs = self.period.as_secs_f64(), "background event processor started");

        let mut ticker = tokio::time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!(tick, "background event processor tick");
                }
            }
        }

        info!(ticks = self.ticks(), "background event processor stopped");
    }
}
