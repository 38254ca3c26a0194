//! Sync worker: applies one job to the target store.

use std::sync::Arc;
use store::TargetStore;
use sync_core::{ApplyOutcome, Result, SyncJob, SyncOperation};
use tracing::{debug, error};

/// Applies sync jobs transactionally. Each store call is one transaction,
/// so a failure leaves no partial write.
#[derive(Clone)]
pub struct SyncWorker {
    target: Arc<dyn TargetStore>,
}

impl SyncWorker {
    pub fn new(target: Arc<dyn TargetStore>) -> Self {
        Self { target }
    }

    /// Upserts or tombstones by email according to the job's operation.
    ///
    /// Errors are logged with the email and returned for the queue to retry.
    pub async fn apply(&self, job: &SyncJob) -> Result<ApplyOutcome> {
        let result = match &job.operation {
            SyncOperation::Upsert { record } => self.target.upsert(record, job.version).await,
            SyncOperation::Delete { email } => self.target.tombstone(email, job.version).await,
        };

        match &result {
            Ok(outcome) => debug!(
                email = %job.email(),
                action = %job.action(),
                outcome = %outcome,
                "Applied job to target"
            ),
            Err(e) => error!(
                email = %job.email(),
                action = %job.action(),
                job_id = %job.id,
                error = %e,
                "Target transaction rolled back"
            ),
        }

        result
    }

    pub fn target(&self) -> &Arc<dyn TargetStore> {
        &self.target
    }
}
