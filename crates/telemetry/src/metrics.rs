//! In-process pipeline metrics.
//!
//! Lock-free counters, gauges and latency histograms, exposed through
//! [`metrics()`] and serialized on the stats endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets, add to last
        self.buckets[10].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the sync pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    // Extraction
    pub etl_runs: Counter,
    pub records_extracted: Counter,
    pub extraction_failures: Counter,

    // Publishing
    pub jobs_published: Counter,
    pub publish_errors: Counter,

    // Apply
    pub jobs_applied: Counter,
    pub apply_errors: Counter,
    pub jobs_retried: Counter,
    pub jobs_dead_lettered: Counter,
    pub jobs_stale: Counter,

    // Latency histograms
    pub etl_run_latency_ms: Histogram,
    pub apply_latency_ms: Histogram,

    // Gauges
    pub queue_depth: Gauge,
    pub failed_jobs: Gauge,
    pub active_workers: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub etl_runs: u64,
    pub records_extracted: u64,
    pub extraction_failures: u64,
    pub jobs_published: u64,
    pub publish_errors: u64,
    pub jobs_applied: u64,
    pub apply_errors: u64,
    pub jobs_retried: u64,
    pub jobs_dead_lettered: u64,
    pub jobs_stale: u64,
    pub etl_run_latency_mean_ms: f64,
    pub apply_latency_mean_ms: f64,
    pub queue_depth: u64,
    pub failed_jobs: u64,
    pub active_workers: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            etl_runs: self.etl_runs.get(),
            records_extracted: self.records_extracted.get(),
            extraction_failures: self.extraction_failures.get(),
            jobs_published: self.jobs_published.get(),
            publish_errors: self.publish_errors.get(),
            jobs_applied: self.jobs_applied.get(),
            apply_errors: self.apply_errors.get(),
            jobs_retried: self.jobs_retried.get(),
            jobs_dead_lettered: self.jobs_dead_lettered.get(),
            jobs_stale: self.jobs_stale.get(),
            etl_run_latency_mean_ms: self.etl_run_latency_ms.mean(),
            apply_latency_mean_ms: self.apply_latency_ms.mean(),
            queue_depth: self.queue_depth.get(),
            failed_jobs: self.failed_jobs.get(),
            active_workers: self.active_workers.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
