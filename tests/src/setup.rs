//! Common test setup functions.

use api::{router, AppState};
use axum::Router;
use job_queue::{JobQueue, MemoryQueue, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use store::{SourceStore, TargetStore};
use worker::{EtlOrchestrator, SyncWorker, WorkerConfig, WorkerPool};

use crate::mocks::{FlakyQueue, MockSource, MockTarget};

/// Test context wiring the production pipeline over in-memory stores.
///
/// - The real Axum router with all middleware
/// - The real orchestrator, publisher and worker pool
/// - `MockSource` / `MockTarget` in place of the two databases
/// - `FlakyQueue` over `MemoryQueue` so enqueue failures can be injected
pub struct TestContext {
    pub source: Arc<MockSource>,
    pub target: Arc<MockTarget>,
    pub queue: Arc<FlakyQueue>,
    pub orchestrator: Arc<EtlOrchestrator>,
    pub pool: Arc<WorkerPool>,
    pub router: Router,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_retry(fast_retry())
    }

    pub fn with_retry(retry: RetryPolicy) -> Self {
        let source = Arc::new(MockSource::new());
        let target = Arc::new(MockTarget::new());
        let queue = Arc::new(FlakyQueue::new(Arc::new(MemoryQueue::new(
            Duration::from_secs(30),
        ))));

        let orchestrator = Arc::new(EtlOrchestrator::with_stores(
            source.clone() as Arc<dyn SourceStore>,
            queue.clone() as Arc<dyn JobQueue>,
            5,
        ));
        let pool = Arc::new(WorkerPool::new(
            queue.clone() as Arc<dyn JobQueue>,
            SyncWorker::new(target.clone() as Arc<dyn TargetStore>),
            retry,
            WorkerConfig {
                concurrency: 4,
                poll_interval_ms: 10,
                batch_size: 10,
                stats_interval_secs: 1,
            },
        ));

        let state = AppState::new(
            source.clone() as Arc<dyn SourceStore>,
            target.clone() as Arc<dyn TargetStore>,
            queue.clone() as Arc<dyn JobQueue>,
            orchestrator.clone(),
        );
        let router = router(state);

        Self {
            source,
            target,
            queue,
            orchestrator,
            pool,
            router,
        }
    }

    /// Applies every available job, waiting out retry delays, until the
    /// queue is empty. Returns the number of deliveries.
    pub async fn drain(&self) -> usize {
        let mut processed = 0;
        for _ in 0..50 {
            processed += self.pool.run_until_idle().await;
            if self.queue.memory().ready_len() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        processed
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Retry policy with millisecond backoff so tests do not sleep long.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_backoff_ms: 5,
        max_backoff_ms: 20,
    }
}
