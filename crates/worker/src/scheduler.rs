//! Background task scheduler: the worker pool plus periodic ETL runs.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::EtlConfig;
use crate::etl::EtlOrchestrator;
use crate::pool::WorkerPool;

/// Starts and stops the long-running pipeline tasks.
pub struct WorkerScheduler {
    config: EtlConfig,
    orchestrator: Arc<EtlOrchestrator>,
    pool: Arc<WorkerPool>,
    shutdown: CancellationToken,
}

impl WorkerScheduler {
    pub fn new(
        config: EtlConfig,
        orchestrator: Arc<EtlOrchestrator>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            pool,
            shutdown: CancellationToken::new(),
        }
    }

    /// Spawns the worker pool and, when enabled, the ETL timer.
    pub fn start(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        let pool = self.pool.clone();
        handles.push(tokio::spawn(async move {
            pool.run().await;
        }));
        info!("Sync worker pool started");

        if self.config.enabled {
            let scheduler = self.clone();
            handles.push(tokio::spawn(async move {
                scheduler.run_etl_schedule().await;
            }));
            info!(
                interval_secs = self.config.interval_secs,
                window_minutes = self.config.window_minutes,
                "ETL schedule started"
            );
        } else {
            info!("ETL schedule disabled");
        }

        handles
    }

    /// Stops the ETL timer and the worker pool.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.pool.shutdown();
    }

    async fn run_etl_schedule(&self) {
        let mut ticker = interval(Duration::from_secs(self.config.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.orchestrator.run_once().await;
                }
            }
        }
        info!("ETL schedule stopped");
    }
}
