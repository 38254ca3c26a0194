//! [`JobQueue`] backed by a Redpanda topic.
//!
//! Jobs are records keyed by email. A retry re-produces the job with its
//! delivery count and an `available_at` header, then finishes the original
//! offset. Positions are kept in memory, so a restarted process replays
//! from its start offset; applying a job twice is harmless. Replayed jobs
//! whose id is already in the dead-letter topic are skipped, which keeps
//! `failed_count` stable across restarts.
//!
//! Only one process may consume a partition at a time.

use crate::client::{connect, partition_client};
use crate::config::{RedpandaConfig, StartOffset};
use crate::consumer::Cursor;
use crate::dead_letters::DeadLetterIndex;
use crate::health::missing_topics;
use crate::producer::{read_attempts, read_available_at, JobProducer};
use crate::topics::ensure_topics;
use async_trait::async_trait;
use chrono::Utc;
use job_queue::{JobQueue, LeasedJob, Receipt};
use parking_lot::Mutex;
use rskafka::client::partition::{OffsetAt, PartitionClient};
use rskafka::client::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sync_core::{Error, Result, SyncJob};
use tracing::{debug, error, info, warn};

struct PartitionState {
    id: i32,
    client: Arc<PartitionClient>,
    /// Serializes fetches; held across the network call.
    fetch_lock: tokio::sync::Mutex<()>,
    cursor: Mutex<Cursor>,
}

fn start_at(start: StartOffset) -> OffsetAt {
    match start {
        StartOffset::Earliest => OffsetAt::Earliest,
        StartOffset::Latest => OffsetAt::Latest,
    }
}

/// Redpanda-backed work queue.
pub struct RedpandaQueue {
    client: Client,
    config: RedpandaConfig,
    producer: JobProducer,
    partitions: Vec<PartitionState>,
    lease_timeout: Duration,
    next_partition: AtomicUsize,
    dead: Mutex<DeadLetterIndex>,
}

impl RedpandaQueue {
    /// Connects, creates missing topics and positions every partition at
    /// the configured start offset.
    pub async fn connect(config: RedpandaConfig, lease_timeout: Duration) -> Result<Self> {
        let client = connect(&config).await?;
        let partition_ids = ensure_topics(&client, &config).await?;

        let mut partitions = Vec::with_capacity(partition_ids.len());
        let mut producer_clients = Vec::with_capacity(partition_ids.len());
        for id in partition_ids {
            let pc = partition_client(&client, &config.topic, id).await?;
            let start = pc
                .get_offset(start_at(config.start_offset))
                .await
                .map_err(|e| Error::queue(format!("Failed to get offset: {}", e)))?;

            info!(topic = %config.topic, partition = id, offset = start, "Consumer positioned");

            producer_clients.push((id, pc.clone()));
            partitions.push(PartitionState {
                id,
                client: pc,
                fetch_lock: tokio::sync::Mutex::new(()),
                cursor: Mutex::new(Cursor::new(id, start)),
            });
        }

        let dead_letter = partition_client(&client, &config.dead_letter_topic, 0).await?;
        let dead = DeadLetterIndex::load(
            &dead_letter,
            config.fetch_max_bytes,
            config.fetch_max_wait_ms,
        )
        .await?;
        let producer = JobProducer::new(producer_clients, dead_letter, config.compression.clone());

        Ok(Self {
            client,
            config,
            producer,
            partitions,
            lease_timeout,
            next_partition: AtomicUsize::new(0),
            dead: Mutex::new(dead),
        })
    }

    fn partition(&self, leased: &LeasedJob) -> Result<(&PartitionState, i64)> {
        let Receipt::Offset { partition, offset } = leased.receipt else {
            return Err(Error::queue("Receipt does not belong to a Redpanda lease"));
        };
        self.partitions
            .iter()
            .find(|p| p.id == partition)
            .map(|p| (p, offset))
            .ok_or_else(|| Error::queue(format!("Unknown partition {}", partition)))
    }

    /// Fetches more records into the partition buffer unless another task
    /// is already fetching or the buffer is full.
    async fn fill(&self, state: &PartitionState) -> Result<()> {
        let Ok(_guard) = state.fetch_lock.try_lock() else {
            return Ok(());
        };

        let from = {
            let cursor = state.cursor.lock();
            if cursor.buffered() >= self.config.max_buffered {
                return Ok(());
            }
            cursor.next_fetch()
        };

        let (records, _high_watermark) = state
            .client
            .fetch_records(
                from,
                1..self.config.fetch_max_bytes,
                self.config.fetch_max_wait_ms,
            )
            .await
            .map_err(|e| Error::queue(format!("Failed to fetch records: {}", e)))?;

        let mut poison = Vec::new();
        {
            let dead = self.dead.lock();
            let mut cursor = state.cursor.lock();
            for record in records {
                if record.offset < cursor.next_fetch() {
                    continue;
                }
                let decoded = record
                    .record
                    .value
                    .as_deref()
                    .ok_or_else(|| Error::queue("Record has no value"))
                    .and_then(SyncJob::from_json);
                match decoded {
                    Ok(job) if dead.contains(&job.id) => {
                        debug!(offset = record.offset, job_id = %job.id, "Skipping dead-lettered job");
                        cursor.skip_to(record.offset + 1);
                    }
                    Ok(job) => cursor.push(
                        record.offset,
                        job,
                        read_attempts(&record.record.headers),
                        read_available_at(&record.record.headers),
                    ),
                    Err(e) => {
                        cursor.skip_to(record.offset + 1);
                        poison.push((record.offset, record.record, e));
                    }
                }
            }
        }

        for (offset, record, e) in poison {
            warn!(offset = offset, error = %e, "Undecodable job record, moving to dead letters");
            let attempts = read_attempts(&record.headers);
            let payload = record.value.unwrap_or_default();
            if let Err(dlq) = self
                .producer
                .send_dead(record.key, payload, attempts, &e.to_string())
                .await
            {
                error!(offset = offset, error = %dlq, "Failed to dead-letter undecodable record");
            }
        }

        Ok(())
    }

    fn lease_buffered(&self, state: &PartitionState, max: usize) -> Vec<LeasedJob> {
        state
            .cursor
            .lock()
            .lease(max, Instant::now(), Utc::now(), self.lease_timeout)
    }
}

#[async_trait]
impl JobQueue for RedpandaQueue {
    fn backend(&self) -> &'static str {
        "redpanda"
    }

    async fn enqueue(&self, job: &SyncJob) -> Result<()> {
        self.producer.send(job, 0, None).await?;
        Ok(())
    }

    async fn lease(&self, max: usize) -> Result<Vec<LeasedJob>> {
        let count = self.partitions.len();
        if count == 0 || max == 0 {
            return Ok(Vec::new());
        }

        let first = self.next_partition.fetch_add(1, Ordering::Relaxed) % count;
        let mut out = Vec::new();
        let mut last_error = None;

        for i in 0..count {
            if out.len() >= max {
                break;
            }
            let state = &self.partitions[(first + i) % count];

            out.extend(self.lease_buffered(state, max - out.len()));
            if out.len() < max {
                if let Err(e) = self.fill(state).await {
                    warn!(error = %e, "Fetch failed");
                    last_error = Some(e);
                    continue;
                }
                out.extend(self.lease_buffered(state, max - out.len()));
            }
        }

        match last_error {
            Some(e) if out.is_empty() => Err(e),
            _ => Ok(out),
        }
    }

    async fn ack(&self, leased: &LeasedJob) -> Result<()> {
        let (state, offset) = self.partition(leased)?;
        if !state.cursor.lock().release(offset, leased.attempts) {
            debug!(job_id = %leased.job.id, offset = offset, "Lease no longer held");
        }
        Ok(())
    }

    async fn retry(&self, leased: &LeasedJob, delay: Duration) -> Result<()> {
        let (state, offset) = self.partition(leased)?;
        if !state.cursor.lock().owns(offset, leased.attempts) {
            debug!(job_id = %leased.job.id, offset = offset, "Lease no longer held");
            return Ok(());
        }

        let available_at = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        self.producer
            .send(&leased.job, leased.attempts, Some(available_at))
            .await?;

        state.cursor.lock().release(offset, leased.attempts);
        Ok(())
    }

    async fn dead_letter(&self, leased: &LeasedJob, reason: &str) -> Result<()> {
        let (state, offset) = self.partition(leased)?;
        if !state.cursor.lock().owns(offset, leased.attempts) {
            debug!(job_id = %leased.job.id, offset = offset, "Lease no longer held");
            return Ok(());
        }

        self.producer
            .send_dead(
                Some(leased.job.email().as_bytes().to_vec()),
                leased.job.to_json()?,
                leased.attempts,
                reason,
            )
            .await?;

        self.dead.lock().insert(leased.job.id);
        state.cursor.lock().release(offset, leased.attempts);
        Ok(())
    }

    async fn depth(&self) -> Result<u64> {
        let mut depth = 0u64;
        for state in &self.partitions {
            let latest = state
                .client
                .get_offset(OffsetAt::Latest)
                .await
                .map_err(|e| Error::queue(format!("Failed to get offset: {}", e)))?;
            let committed = state.cursor.lock().committed();
            depth += (latest - committed).max(0) as u64;
        }
        Ok(depth)
    }

    async fn failed_count(&self) -> Result<u64> {
        let client = self.producer.dead_letter_client();
        let latest = client
            .get_offset(OffsetAt::Latest)
            .await
            .map_err(|e| Error::queue(format!("Failed to get offset: {}", e)))?;
        let earliest = client
            .get_offset(OffsetAt::Earliest)
            .await
            .map_err(|e| Error::queue(format!("Failed to get offset: {}", e)))?;
        Ok((latest - earliest).max(0) as u64)
    }

    async fn health_check(&self) -> bool {
        let topics = [
            self.config.topic.as_str(),
            self.config.dead_letter_topic.as_str(),
        ];
        match missing_topics(&self.client, &topics).await {
            Some(missing) if missing.is_empty() => true,
            Some(missing) => {
                error!(missing = ?missing, "Redpanda topics missing");
                false
            }
            None => false,
        }
    }
}
