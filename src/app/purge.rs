use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::app::error::ServiceResult;
use crate::domain::post::{PurgeCandidate, PurgeJob};
use crate::infra::queue::JobQueue;
use crate::infra::repo::Store;

const ENQUEUE_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: u64,
    pub enqueued: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeOutcome {
    Purged,
    /// Already gone, restored, or deleted again under a newer marker.
    Skipped,
}

#[derive(Clone)]
pub struct PurgeService {
    store: Store,
    queue: Arc<dyn JobQueue>,
    retention_days: i64,
    batch_size: i64,
}

impl PurgeService {
    pub fn new(store: Store, queue: Arc<dyn JobQueue>, retention_days: i64, batch_size: i64) -> Self {
        Self {
            store,
            queue,
            retention_days,
            batch_size: batch_size.max(1),
        }
    }

    /// Enqueues one job per post soft-deleted at or before `now - retention`.
    /// Enqueue failures are counted, never fatal.
    pub async fn sweep(&self, now: OffsetDateTime) -> ServiceResult<SweepReport> {
        let cutoff = now - Duration::days(self.retention_days);
        let mut report = SweepReport::default();
        let mut after = None;

        loop {
            let batch = self
                .store
                .posts
                .purge_candidates(cutoff, after, self.batch_size)
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            after = Some((last.deleted_at, last.id));
            report.scanned += batch.len() as u64;
            let full = batch.len() as i64 == self.batch_size;

            let results: Vec<bool> = stream::iter(batch)
                .map(|candidate| self.enqueue(candidate))
                .buffer_unordered(ENQUEUE_CONCURRENCY)
                .collect()
                .await;
            for enqueued in results {
                if enqueued {
                    report.enqueued += 1;
                } else {
                    report.failed += 1;
                }
            }

            if !full {
                break;
            }
        }

        tracing::info!(
            scanned = report.scanned,
            enqueued = report.enqueued,
            failed = report.failed,
            cutoff = %cutoff,
            "purge sweep finished"
        );
        Ok(report)
    }

    pub async fn purge(&self, job: &PurgeJob) -> ServiceResult<PurgeOutcome> {
        if self.store.posts.purge(job.post_id, job.deletion_seq).await? {
            tracing::info!(post_id = %job.post_id, "post purged");
            Ok(PurgeOutcome::Purged)
        } else {
            tracing::debug!(post_id = %job.post_id, deletion_seq = job.deletion_seq, "purge skipped");
            Ok(PurgeOutcome::Skipped)
        }
    }

    async fn enqueue(&self, candidate: PurgeCandidate) -> bool {
        match self.queue.enqueue(&PurgeJob::from(candidate)).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = ?err, post_id = %candidate.id, "failed to enqueue purge job");
                false
            }
        }
    }
}
