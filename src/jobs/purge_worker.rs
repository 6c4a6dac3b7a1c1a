use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::app::purge::{PurgeOutcome, PurgeService};
use crate::infra::queue::JobQueue;

const POLL_WAIT_SECONDS: i32 = 10;
const IDLE_SLEEP_MS: u64 = 200;
const ERROR_BACKOFF_MS: u64 = 1000;
const RETRY_BASE_SECONDS: i32 = 30;
const RETRY_MAX_SECONDS: i32 = 15 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed(PurgeOutcome),
    RetryLater,
}

pub async fn run(service: PurgeService, queue: Arc<dyn JobQueue>) -> Result<()> {
    info!("purge worker started");
    loop {
        match process_next(&service, queue.as_ref(), POLL_WAIT_SECONDS).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tokio::time::sleep(Duration::from_millis(IDLE_SLEEP_MS)).await;
            }
            Err(err) => {
                warn!(error = ?err, "queue receive failed, backing off");
                tokio::time::sleep(Duration::from_millis(ERROR_BACKOFF_MS)).await;
            }
        }
    }
}

/// Handles at most one message. `Ok(None)` means the queue was empty.
pub async fn process_next(
    service: &PurgeService,
    queue: &dyn JobQueue,
    wait_time_seconds: i32,
) -> Result<Option<JobOutcome>> {
    let Some(message) = queue.receive(wait_time_seconds).await? else {
        return Ok(None);
    };

    let outcome = match service.purge(&message.job).await {
        Ok(outcome) => JobOutcome::Completed(outcome),
        Err(err) => {
            error!(
                error = ?err,
                post_id = %message.job.post_id,
                attempts = message.attempts,
                "failed to purge post"
            );
            JobOutcome::RetryLater
        }
    };

    match outcome {
        JobOutcome::Completed(_) => {
            if let Err(err) = queue.ack(&message.receipt_handle).await {
                warn!(error = ?err, "failed to delete queue message");
            }
        }
        JobOutcome::RetryLater => {
            let delay = retry_delay(message.attempts);
            if let Err(err) = queue.release(&message.receipt_handle, delay).await {
                warn!(error = ?err, "failed to release queue message");
            }
        }
    }

    Ok(Some(outcome))
}

/// Exponential backoff on the delivery count, capped.
fn retry_delay(attempts: u32) -> i32 {
    let exponent = attempts.saturating_sub(1).min(10);
    RETRY_BASE_SECONDS
        .saturating_mul(1 << exponent)
        .min(RETRY_MAX_SECONDS)
}
