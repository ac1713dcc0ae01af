//! Periodic recurring-pattern detection for all tenants.

use crate::services::PatternService;
use chrono::Utc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

pub struct PatternRefreshWorker {
    service: PatternService,
    every: Duration,
}

impl PatternRefreshWorker {
    pub fn new(service: PatternService, every: Duration) -> Self {
        Self { service, every }
    }

    /// One pass over all tenants.
    pub async fn run_once(&self) {
        let today = Utc::now().date_naive();
        match self.service.refresh_all(today).await {
            Ok(summary) => info!(
                tenants = summary.tenants,
                failed = summary.failed,
                patterns = summary.patterns,
                "Pattern refresh cycle complete"
            ),
            Err(e) => error!(error = %e, "Pattern refresh cycle failed"),
        }
    }

    /// Run forever. The first pass starts immediately.
    pub async fn start(self) {
        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.every.as_secs(), "Pattern refresh worker started");

        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.start())
    }
}
