use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use anyhow::{bail, Result};

/// Fires a collection job at a fixed interval.
pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval_ms: u64) -> Result<Self> {
        if interval_ms == 0 {
            bail!("probe interval must be greater than 0");
        }
        Ok(Self {
            interval: Duration::from_millis(interval_ms),
        })
    }

    /// job: async closure for each tick. Runs until the process exits.
    pub async fn run<J, F>(&self, mut job: J) -> Result<()>
    where
        J: FnMut() -> F + Send + 'static,
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut ticker = interval(self.interval);
        // A slow collection must not cause a burst of catch-up ticks.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            // spawn job so next tick unaffected by job duration
            tokio::spawn(job());
        }
    }
}
