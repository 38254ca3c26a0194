//! Sync worker pool.
//!
//! Polls the queue, applies leased jobs concurrently up to the configured
//! limit, and settles each lease: ack on success, retry with backoff on
//! failure, dead letter once retries are exhausted.

use job_queue::{JobQueue, LeasedJob, RetryPolicy};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sync_core::ApplyOutcome;
use telemetry::{health, metrics};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::sync::SyncWorker;

/// Pool of sync workers draining one queue.
pub struct WorkerPool {
    queue: Arc<dyn JobQueue>,
    worker: SyncWorker,
    retry: RetryPolicy,
    config: WorkerConfig,
    shutdown: AtomicBool,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        worker: SyncWorker,
        retry: RetryPolicy,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            worker,
            retry,
            config,
            shutdown: AtomicBool::new(false),
        }
    }

    /// Polls until [`shutdown`](Self::shutdown), then waits for in-flight jobs.
    pub async fn run(&self) {
        info!(
            backend = self.queue.backend(),
            concurrency = self.config.concurrency,
            poll_interval_ms = self.config.poll_interval_ms,
            "Starting sync worker pool"
        );

        let concurrency = self.config.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut poll = interval(Duration::from_millis(self.config.poll_interval_ms.max(1)));
        let mut stats = interval(Duration::from_secs(self.config.stats_interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    if self.is_shutdown() {
                        info!("Worker pool shutdown requested, stopping poll loop");
                        break;
                    }
                    self.poll_and_process(&semaphore).await;
                }
                _ = stats.tick() => {
                    self.refresh_queue_stats().await;
                }
            }
        }

        info!("Waiting for in-flight sync jobs to complete");
        let _ = semaphore.acquire_many(concurrency as u32).await;
        info!("Worker pool stopped");
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        info!("Worker pool shutdown requested");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Leases only as many jobs as there are free workers, so no lease
    /// sits idle waiting for a permit.
    async fn poll_and_process(&self, semaphore: &Arc<Semaphore>) {
        let free = semaphore.available_permits().min(self.config.batch_size);
        if free == 0 {
            return;
        }

        let jobs = match self.queue.lease(free).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "Failed to lease sync jobs");
                health().queue.set_unhealthy(e.to_string());
                return;
            }
        };

        if jobs.is_empty() {
            return;
        }
        debug!(count = jobs.len(), "Leased sync jobs");

        for leased in jobs {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                return;
            };
            let queue = self.queue.clone();
            let worker = self.worker.clone();
            let retry = self.retry.clone();

            tokio::spawn(async move {
                let _permit = permit;
                process_job(queue, worker, retry, leased).await;
            });
        }
    }

    /// Leases and applies jobs until the queue has nothing available.
    ///
    /// Jobs whose retry delay has not elapsed are left in the queue.
    /// Returns the number of deliveries processed.
    pub async fn run_until_idle(&self) -> usize {
        let mut processed = 0;

        loop {
            let jobs = match self.queue.lease(self.config.batch_size.max(1)).await {
                Ok(jobs) if jobs.is_empty() => break,
                Ok(jobs) => jobs,
                Err(e) => {
                    error!(error = %e, "Failed to lease sync jobs");
                    break;
                }
            };

            processed += jobs.len();
            let mut tasks = JoinSet::new();
            for leased in jobs {
                tasks.spawn(process_job(
                    self.queue.clone(),
                    self.worker.clone(),
                    self.retry.clone(),
                    leased,
                ));
            }
            while tasks.join_next().await.is_some() {}
        }

        processed
    }

    /// Updates queue gauges and the queue health component.
    pub async fn refresh_queue_stats(&self) {
        if !self.queue.health_check().await {
            health().queue.set_unhealthy("queue backend unreachable");
            return;
        }
        health().queue.set_healthy();

        match self.queue.depth().await {
            Ok(depth) => metrics().queue_depth.set(depth),
            Err(e) => warn!(error = %e, "Failed to read queue depth"),
        }
        match self.queue.failed_count().await {
            Ok(failed) => metrics().failed_jobs.set(failed),
            Err(e) => warn!(error = %e, "Failed to read failed job count"),
        }
    }
}

/// Applies one leased job and settles its lease.
async fn process_job(
    queue: Arc<dyn JobQueue>,
    worker: SyncWorker,
    retry: RetryPolicy,
    leased: LeasedJob,
) {
    metrics().active_workers.inc();
    let start = Instant::now();
    let email = leased.job.email().to_string();
    let attempt = leased.attempts;

    match worker.apply(&leased.job).await {
        Ok(outcome) => {
            metrics().jobs_applied.inc();
            metrics()
                .apply_latency_ms
                .observe(start.elapsed().as_millis() as u64);
            if outcome == ApplyOutcome::Stale {
                metrics().jobs_stale.inc();
            }
            info!(
                email = %email,
                outcome = %outcome,
                attempt = attempt,
                "Sync job applied"
            );

            if let Err(e) = queue.ack(&leased).await {
                error!(email = %email, error = %e, "Failed to ack sync job");
            }
        }
        Err(e) => {
            metrics().apply_errors.inc();
            error!(
                email = %email,
                attempt = attempt,
                error = %e,
                "Sync job failed"
            );

            if retry.should_retry(attempt) {
                let backoff = retry.backoff(attempt);
                metrics().jobs_retried.inc();
                warn!(
                    email = %email,
                    attempt = attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Retrying sync job"
                );
                if let Err(re) = queue.retry(&leased, backoff).await {
                    error!(email = %email, error = %re, "Failed to schedule retry");
                }
            } else {
                metrics().jobs_dead_lettered.inc();
                error!(
                    email = %email,
                    attempts = attempt,
                    error = %e,
                    "Sync job dead-lettered"
                );
                if let Err(re) = queue.dead_letter(&leased, &e.to_string()).await {
                    error!(email = %email, error = %re, "Failed to dead-letter sync job");
                }
            }
        }
    }

    metrics().active_workers.dec();
}
