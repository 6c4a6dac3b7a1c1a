use std::time::Duration;

use anyhow::Result;
use time::OffsetDateTime;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::app::purge::PurgeService;

/// Runs a purge sweep every `interval`, the first one immediately.
pub async fn run(service: PurgeService, interval: Duration) -> Result<()> {
    info!(interval_seconds = interval.as_secs(), "purge scheduler started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(err) = service.sweep(OffsetDateTime::now_utc()).await {
            error!(error = ?err, "purge sweep failed");
        }
    }
}
