//! Redpanda health checks.

use rskafka::client::Client;
use std::collections::HashSet;
use tracing::{debug, error};

/// Topics from `topics` that the cluster does not have. `None` when the
/// cluster cannot be reached.
pub async fn missing_topics(client: &Client, topics: &[&str]) -> Option<Vec<String>> {
    match client.list_topics().await {
        Ok(existing_topics) => {
            let existing: HashSet<_> = existing_topics.iter().map(|t| t.name.as_str()).collect();
            let missing: Vec<String> = topics
                .iter()
                .filter(|t| !existing.contains(*t))
                .map(|t| t.to_string())
                .collect();
            debug!(
                topics = existing_topics.len(),
                missing = missing.len(),
                "Redpanda connection healthy"
            );
            Some(missing)
        }
        Err(e) => {
            error!("Failed to list Redpanda topics: {}", e);
            None
        }
    }
}
