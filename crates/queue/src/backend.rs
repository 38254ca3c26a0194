//! The work queue contract shared by all backends.

use async_trait::async_trait;
use std::time::Duration;
use sync_core::{Result, SyncJob};
use uuid::Uuid;

/// Backend-specific handle proving ownership of a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receipt {
    /// Row or entry keyed by job id (PostgreSQL, in-memory).
    Row(Uuid),
    /// Record position in a partitioned log (Redpanda).
    Offset { partition: i32, offset: i64 },
}

/// A job handed to exactly one worker.
#[derive(Debug, Clone)]
pub struct LeasedJob {
    pub job: SyncJob,
    /// 1-based delivery attempt.
    pub attempts: u32,
    pub receipt: Receipt,
}

/// Durable work queue with at-least-once delivery.
///
/// A leased job is invisible to other workers until it is acked, retried,
/// dead-lettered, or its lease expires.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Backend name for logs and health output.
    fn backend(&self) -> &'static str;

    /// Durably enqueues a job.
    async fn enqueue(&self, job: &SyncJob) -> Result<()>;

    /// Leases up to `max` available jobs.
    async fn lease(&self, max: usize) -> Result<Vec<LeasedJob>>;

    /// Marks a leased job as done.
    async fn ack(&self, leased: &LeasedJob) -> Result<()>;

    /// Releases a leased job for redelivery after `delay`.
    async fn retry(&self, leased: &LeasedJob, delay: Duration) -> Result<()>;

    /// Moves a leased job to the failed-job store.
    async fn dead_letter(&self, leased: &LeasedJob, error: &str) -> Result<()>;

    /// Jobs waiting or in flight.
    async fn depth(&self) -> Result<u64>;

    /// Jobs in the failed-job store.
    async fn failed_count(&self) -> Result<u64>;

    /// Checks that the backend is reachable.
    async fn health_check(&self) -> bool;
}
