//! Queue configuration.

use serde::{Deserialize, Serialize};

/// Which queue implementation to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    /// Process-local queue. Not durable; development and tests only.
    Memory,
    /// `jobs` / `failed_jobs` tables in the target database.
    Postgres,
    /// Redpanda topic plus a dead-letter topic.
    Redpanda,
}

impl std::str::FromStr for QueueBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(QueueBackend::Memory),
            "postgres" | "postgresql" => Ok(QueueBackend::Postgres),
            "redpanda" | "kafka" => Ok(QueueBackend::Redpanda),
            _ => Err(format!("Unknown queue backend: {s}")),
        }
    }
}

/// Queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_backend")]
    pub backend: QueueBackend,
    /// Logical queue name (row partition for the PostgreSQL backend)
    #[serde(default = "default_name")]
    pub name: String,
    /// Seconds before an unacknowledged lease is redelivered
    #[serde(default = "default_lease_timeout_secs")]
    pub lease_timeout_secs: u64,
}

fn default_backend() -> QueueBackend {
    QueueBackend::Postgres
}

fn default_name() -> String {
    "client-sync".to_string()
}

fn default_lease_timeout_secs() -> u64 {
    90
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            name: default_name(),
            lease_timeout_secs: default_lease_timeout_secs(),
        }
    }
}
