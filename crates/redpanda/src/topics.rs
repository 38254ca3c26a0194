//! Topic layout and creation.

use crate::config::RedpandaConfig;
use rskafka::client::Client;
use sync_core::{Error, Result};
use tracing::info;

/// Record header names carried by job records.
pub mod header {
    /// Deliveries already attempted, decimal.
    pub const ATTEMPTS: &str = "attempts";
    /// Earliest lease time, RFC 3339.
    pub const AVAILABLE_AT: &str = "available_at";
    /// Last apply error (dead-letter topic only).
    pub const ERROR: &str = "error";
}

/// Topic configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i16,
}

impl TopicConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partitions: 1,
            replication_factor: 1,
        }
    }

    pub fn with_partitions(mut self, partitions: i32) -> Self {
        self.partitions = partitions.max(1);
        self
    }

    pub fn with_replication(mut self, factor: i16) -> Self {
        self.replication_factor = factor.max(1);
        self
    }
}

/// Job topic and dead-letter topic. The dead-letter topic is always single
/// partition.
pub fn topic_configs(config: &RedpandaConfig) -> Vec<TopicConfig> {
    vec![
        TopicConfig::new(&config.topic)
            .with_partitions(config.partitions)
            .with_replication(config.replication_factor),
        TopicConfig::new(&config.dead_letter_topic).with_replication(config.replication_factor),
    ]
}

/// Creates missing topics and returns the job topic's partition ids.
pub async fn ensure_topics(client: &Client, config: &RedpandaConfig) -> Result<Vec<i32>> {
    let existing = client
        .list_topics()
        .await
        .map_err(|e| Error::queue(format!("Failed to list topics: {}", e)))?;

    let controller = client
        .controller_client()
        .map_err(|e| Error::queue(format!("Failed to get controller: {}", e)))?;

    for topic in topic_configs(config) {
        if existing.iter().any(|t| t.name == topic.name) {
            continue;
        }
        controller
            .create_topic(
                topic.name.clone(),
                topic.partitions,
                topic.replication_factor,
                5_000,
            )
            .await
            .map_err(|e| Error::queue(format!("Failed to create topic {}: {}", topic.name, e)))?;
        info!(
            topic = %topic.name,
            partitions = topic.partitions,
            "Created topic"
        );
    }

    let partitions = client
        .list_topics()
        .await
        .map_err(|e| Error::queue(format!("Failed to list topics: {}", e)))?
        .into_iter()
        .find(|t| t.name == config.topic)
        .map(|t| t.partitions.into_iter().collect::<Vec<_>>())
        .unwrap_or_default();

    if partitions.is_empty() {
        return Err(Error::queue(format!("Topic {} has no partitions", config.topic)));
    }
    Ok(partitions)
}
