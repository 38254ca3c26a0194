//! Worker pool and ETL schedule configuration.

use serde::{Deserialize, Serialize};
use sync_core::limits::DEFAULT_EXTRACT_WINDOW_MINUTES;

/// Sync worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Jobs applied concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// How often an idle pool polls the queue
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum jobs leased per poll
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// How often queue depth and health are refreshed
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_batch_size() -> usize {
    10
}

fn default_stats_interval_secs() -> u64 {
    15
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            batch_size: default_batch_size(),
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

/// ETL schedule configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    /// Lookback window of each extraction
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u64,
    /// Seconds between scheduled runs
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Run on a schedule inside `serve`
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_window_minutes() -> u64 {
    DEFAULT_EXTRACT_WINDOW_MINUTES
}

fn default_interval_secs() -> u64 {
    300
}

fn default_enabled() -> bool {
    true
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
            interval_secs: default_interval_secs(),
            enabled: default_enabled(),
        }
    }
}
