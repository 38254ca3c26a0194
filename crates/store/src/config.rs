//! Database configuration.

use serde::{Deserialize, Serialize};

/// Connection settings for one PostgreSQL database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL
    pub url: String,
    /// Maximum pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }

    /// Default for the upstream (read-only) database.
    pub fn source_default() -> Self {
        Self::new("postgres://localhost:5432/legacy")
    }

    /// Default for the target database.
    pub fn target_default() -> Self {
        Self::new("postgres://localhost:5432/client_sync")
    }
}
