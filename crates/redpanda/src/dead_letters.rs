//! Ids of jobs already in the dead-letter topic.
//!
//! Positions are not persisted, so a restarted consumer replays the job
//! topic. Replayed records whose job id is indexed here are skipped
//! instead of being dead-lettered a second time.

use rskafka::client::partition::{OffsetAt, PartitionClient};
use std::collections::HashSet;
use sync_core::{Error, Result, SyncJob};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct DeadLetterIndex {
    ids: HashSet<Uuid>,
}

impl DeadLetterIndex {
    pub fn insert(&mut self, id: Uuid) {
        self.ids.insert(id);
    }

    /// Indexes a dead-letter payload. Undecodable payloads are ignored.
    pub fn insert_payload(&mut self, payload: Option<&[u8]>) {
        if let Some(job) = payload.and_then(|bytes| SyncJob::from_json(bytes).ok()) {
            self.ids.insert(job.id);
        }
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Reads the retained dead-letter partition from earliest to latest.
    pub async fn load(
        client: &PartitionClient,
        fetch_max_bytes: i32,
        fetch_max_wait_ms: i32,
    ) -> Result<Self> {
        let latest = client
            .get_offset(OffsetAt::Latest)
            .await
            .map_err(|e| Error::queue(format!("Failed to get offset: {}", e)))?;
        let mut offset = client
            .get_offset(OffsetAt::Earliest)
            .await
            .map_err(|e| Error::queue(format!("Failed to get offset: {}", e)))?;

        let mut index = Self::default();
        while offset < latest {
            let (records, _high_watermark) = client
                .fetch_records(offset, 1..fetch_max_bytes, fetch_max_wait_ms)
                .await
                .map_err(|e| Error::queue(format!("Failed to fetch dead letters: {}", e)))?;
            let Some(last) = records.last() else {
                break;
            };
            offset = last.offset + 1;
            for record in &records {
                index.insert_payload(record.record.value.as_deref());
            }
        }

        info!(jobs = index.len(), "Indexed dead-lettered jobs");
        Ok(index)
    }
}
