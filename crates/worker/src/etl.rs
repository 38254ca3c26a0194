//! ETL orchestrator: extract, normalize, publish.

use job_queue::JobQueue;
use std::sync::Arc;
use std::time::Instant;
use store::SourceStore;
use sync_core::{normalize, SyncAction};
use telemetry::metrics;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::extractor::Extractor;
use crate::publisher::QueuePublisher;

/// Drives one extraction pass into the queue.
///
/// Runs never overlap: a run triggered while another is in progress waits
/// for it to finish.
pub struct EtlOrchestrator {
    extractor: Extractor,
    publisher: QueuePublisher,
    window_minutes: u64,
    running: Mutex<()>,
}

impl EtlOrchestrator {
    pub fn new(extractor: Extractor, publisher: QueuePublisher, window_minutes: u64) -> Self {
        Self {
            extractor,
            publisher,
            window_minutes,
            running: Mutex::new(()),
        }
    }

    /// Builds the extractor and publisher over shared stores.
    pub fn with_stores(
        source: Arc<dyn SourceStore>,
        queue: Arc<dyn JobQueue>,
        window_minutes: u64,
    ) -> Self {
        Self::new(
            Extractor::new(source),
            QueuePublisher::new(queue),
            window_minutes,
        )
    }

    /// Extracts changed records, normalizes and publishes each one.
    ///
    /// Returns the number of jobs enqueued. Publish failures are skipped.
    pub async fn run_once(&self) -> usize {
        let _guard = self.running.lock().await;
        let start = Instant::now();

        let records = self.extractor.extract(self.window_minutes).await;
        let extracted = records.len();

        let mut enqueued = 0;
        for raw in records {
            let record = normalize(raw);
            if self.publisher.publish(record, SyncAction::Upsert).await {
                enqueued += 1;
            }
        }

        let elapsed = start.elapsed();
        metrics().etl_runs.inc();
        metrics()
            .etl_run_latency_ms
            .observe(elapsed.as_millis() as u64);

        if enqueued < extracted {
            warn!(
                extracted = extracted,
                enqueued = enqueued,
                failed = extracted - enqueued,
                "ETL run finished with publish failures"
            );
        }
        info!(
            extracted = extracted,
            enqueued = enqueued,
            window_minutes = self.window_minutes,
            latency_ms = %elapsed.as_millis(),
            "ETL run complete"
        );

        enqueued
    }
}
