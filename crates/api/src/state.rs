//! Application state shared across handlers.

use chrono::{DateTime, Utc};
use job_queue::JobQueue;
use std::sync::Arc;
use store::{SourceStore, TargetStore};
use worker::{EtlOrchestrator, QueuePublisher};

/// Shared application state.
///
/// Handlers read from the target store but never write to it; every
/// mutation is published as a sync job.
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn SourceStore>,
    pub target: Arc<dyn TargetStore>,
    pub queue: Arc<dyn JobQueue>,
    pub publisher: QueuePublisher,
    pub orchestrator: Arc<EtlOrchestrator>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        source: Arc<dyn SourceStore>,
        target: Arc<dyn TargetStore>,
        queue: Arc<dyn JobQueue>,
        orchestrator: Arc<EtlOrchestrator>,
    ) -> Self {
        Self {
            source,
            target,
            publisher: QueuePublisher::new(queue.clone()),
            queue,
            orchestrator,
            started_at: Utc::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }
}
