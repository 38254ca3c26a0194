//! Job record encoding and producing.

use crate::client::compression;
use crate::partitioner::partition_for;
use crate::topics::header;
use chrono::{DateTime, Utc};
use rskafka::client::partition::PartitionClient;
use rskafka::record::Record;
use std::collections::BTreeMap;
use std::sync::Arc;
use sync_core::{Error, Result, SyncJob};
use tracing::{debug, error};

/// Builds the record for `job`.
///
/// `attempts` counts deliveries already made; `available_at` delays the
/// next lease.
pub fn job_record(
    job: &SyncJob,
    attempts: u32,
    available_at: Option<DateTime<Utc>>,
) -> Result<Record> {
    let mut headers = BTreeMap::new();
    headers.insert(
        header::ATTEMPTS.to_string(),
        attempts.to_string().into_bytes(),
    );
    if let Some(at) = available_at {
        headers.insert(
            header::AVAILABLE_AT.to_string(),
            at.to_rfc3339().into_bytes(),
        );
    }

    Ok(Record {
        key: Some(job.email().as_bytes().to_vec()),
        value: Some(job.to_json()?),
        headers,
        timestamp: Utc::now(),
    })
}

/// Deliveries recorded on a job record. Missing or garbled means none.
pub fn read_attempts(headers: &BTreeMap<String, Vec<u8>>) -> u32 {
    headers
        .get(header::ATTEMPTS)
        .and_then(|v| std::str::from_utf8(v).ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Earliest lease time recorded on a job record.
pub fn read_available_at(headers: &BTreeMap<String, Vec<u8>>) -> Option<DateTime<Utc>> {
    headers
        .get(header::AVAILABLE_AT)
        .and_then(|v| std::str::from_utf8(v).ok())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Produces job records to the job topic and the dead-letter topic.
pub struct JobProducer {
    /// Job topic partitions, sorted by id.
    partitions: Vec<(i32, Arc<PartitionClient>)>,
    dead_letter: Arc<PartitionClient>,
    compression: String,
}

impl JobProducer {
    pub fn new(
        partitions: Vec<(i32, Arc<PartitionClient>)>,
        dead_letter: Arc<PartitionClient>,
        compression: impl Into<String>,
    ) -> Self {
        Self {
            partitions,
            dead_letter,
            compression: compression.into(),
        }
    }

    /// Produces `job`, routed by email. Returns (partition, offset).
    pub async fn send(
        &self,
        job: &SyncJob,
        attempts: u32,
        available_at: Option<DateTime<Utc>>,
    ) -> Result<(i32, i64)> {
        let index = partition_for(job.email(), self.partitions.len() as i32) as usize;
        let (partition, client) = self
            .partitions
            .get(index)
            .ok_or_else(|| Error::publish("Job topic has no partitions"))?;

        let record = job_record(job, attempts, available_at)?;
        let offsets = client
            .produce(vec![record], compression(&self.compression))
            .await
            .map_err(|e| {
                error!(job_id = %job.id, error = %e, "Failed to produce job");
                Error::publish(format!("Failed to produce: {}", e))
            })?;

        let offset = offsets.first().copied().unwrap_or_default();
        debug!(
            job_id = %job.id,
            partition = *partition,
            offset = offset,
            attempts = attempts,
            "Produced job record"
        );
        Ok((*partition, offset))
    }

    /// Produces a failed payload to the dead-letter topic.
    pub async fn send_dead(
        &self,
        key: Option<Vec<u8>>,
        payload: Vec<u8>,
        attempts: u32,
        reason: &str,
    ) -> Result<()> {
        let mut headers = BTreeMap::new();
        headers.insert(
            header::ATTEMPTS.to_string(),
            attempts.to_string().into_bytes(),
        );
        headers.insert(header::ERROR.to_string(), reason.as_bytes().to_vec());

        let record = Record {
            key,
            value: Some(payload),
            headers,
            timestamp: Utc::now(),
        };

        self.dead_letter
            .produce(vec![record], compression(&self.compression))
            .await
            .map_err(|e| Error::queue(format!("Failed to produce dead letter: {}", e)))?;
        Ok(())
    }

    pub fn dead_letter_client(&self) -> &Arc<PartitionClient> {
        &self.dead_letter
    }
}
