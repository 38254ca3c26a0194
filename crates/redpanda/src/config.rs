//! Redpanda configuration.

use serde::{Deserialize, Serialize};

/// Where a consumer starts when it has no position yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartOffset {
    /// Replay the retained log. Safe because applying a job is idempotent.
    #[default]
    Earliest,
    /// Only records produced after startup.
    Latest,
}

/// Redpanda job queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    /// Broker addresses
    #[serde(default = "default_brokers")]
    pub brokers: Vec<String>,
    /// Topic carrying sync jobs, keyed by email
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Topic receiving jobs that exhausted their retries
    #[serde(default = "default_dead_letter_topic")]
    pub dead_letter_topic: String,
    /// Partitions used when the topics are created
    #[serde(default = "default_partitions")]
    pub partitions: i32,
    /// Replication factor used when the topics are created
    #[serde(default = "default_replication_factor")]
    pub replication_factor: i16,
    /// Compression type (none, gzip, snappy, lz4, zstd)
    #[serde(default = "default_compression")]
    pub compression: String,
    /// Upper bound of one fetch response in bytes
    #[serde(default = "default_fetch_max_bytes")]
    pub fetch_max_bytes: i32,
    /// How long a fetch waits for new records
    #[serde(default = "default_fetch_max_wait_ms")]
    pub fetch_max_wait_ms: i32,
    /// Fetched records held in memory per partition before fetching pauses
    #[serde(default = "default_max_buffered")]
    pub max_buffered: usize,
    #[serde(default)]
    pub start_offset: StartOffset,
    /// SASL username (Redpanda Cloud)
    #[serde(default)]
    pub sasl_username: Option<String>,
    /// SASL password (Redpanda Cloud)
    #[serde(default)]
    pub sasl_password: Option<String>,
}

fn default_brokers() -> Vec<String> {
    vec!["localhost:9092".to_string()]
}

fn default_topic() -> String {
    "client-sync".to_string()
}

fn default_dead_letter_topic() -> String {
    "client-sync-dlq".to_string()
}

fn default_partitions() -> i32 {
    1
}

fn default_replication_factor() -> i16 {
    1
}

fn default_compression() -> String {
    "lz4".to_string()
}

fn default_fetch_max_bytes() -> i32 {
    1024 * 1024
}

fn default_fetch_max_wait_ms() -> i32 {
    200
}

fn default_max_buffered() -> usize {
    1000
}

impl Default for RedpandaConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            topic: default_topic(),
            dead_letter_topic: default_dead_letter_topic(),
            partitions: default_partitions(),
            replication_factor: default_replication_factor(),
            compression: default_compression(),
            fetch_max_bytes: default_fetch_max_bytes(),
            fetch_max_wait_ms: default_fetch_max_wait_ms(),
            max_buffered: default_max_buffered(),
            start_offset: StartOffset::default(),
            sasl_username: None,
            sasl_password: None,
        }
    }
}

impl RedpandaConfig {
    /// Returns the broker list as a comma-separated string.
    pub fn broker_string(&self) -> String {
        self.brokers.join(",")
    }

    /// Both SASL credentials are set.
    pub fn has_credentials(&self) -> bool {
        self.sasl_username.is_some() && self.sasl_password.is_some()
    }
}
