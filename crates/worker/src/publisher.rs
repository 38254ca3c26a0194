//! Queue publisher: turns canonical records into durable sync jobs.

use job_queue::JobQueue;
use std::sync::Arc;
use sync_core::{CanonicalRecord, SyncAction, SyncJob};
use telemetry::metrics;
use tracing::{error, info};

/// Enqueues sync jobs. Never fails past this boundary.
#[derive(Clone)]
pub struct QueuePublisher {
    queue: Arc<dyn JobQueue>,
}

impl QueuePublisher {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    /// Enqueues `record` with `action`. Returns false if the job was not
    /// durably enqueued.
    pub async fn publish(&self, record: CanonicalRecord, action: SyncAction) -> bool {
        self.publish_job(&SyncJob::new(record, action)).await
    }

    /// Enqueues a prebuilt job.
    pub async fn publish_job(&self, job: &SyncJob) -> bool {
        match self.queue.enqueue(job).await {
            Ok(()) => {
                metrics().jobs_published.inc();
                info!(
                    email = %job.email(),
                    action = %job.action(),
                    job_id = %job.id,
                    "Published sync job"
                );
                true
            }
            Err(e) => {
                metrics().publish_errors.inc();
                error!(
                    email = %job.email(),
                    action = %job.action(),
                    error = %e,
                    "Failed to publish sync job"
                );
                false
            }
        }
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }
}
