//! Process-local queue.
//!
//! Honors the full lease contract (single owner, expiry, retry delay,
//! dead letters) but keeps everything in memory, so jobs do not survive a
//! restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use sync_core::{Result, SyncJob};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::{JobQueue, LeasedJob, Receipt};

/// A job that exhausted its retries.
#[derive(Debug, Clone)]
pub struct DeadJob {
    pub job: SyncJob,
    pub attempts: u32,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Entry {
    job: SyncJob,
    attempts: u32,
    available_at: Instant,
    leased_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct Inner {
    ready: VecDeque<Entry>,
    leased: HashMap<Uuid, Entry>,
    dead: Vec<DeadJob>,
}

/// In-memory [`JobQueue`].
#[derive(Debug)]
pub struct MemoryQueue {
    inner: Mutex<Inner>,
    lease_timeout: Duration,
}

impl MemoryQueue {
    pub fn new(lease_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            lease_timeout,
        }
    }

    /// Snapshot of dead-lettered jobs.
    pub fn dead_letters(&self) -> Vec<DeadJob> {
        self.inner.lock().dead.clone()
    }

    /// Jobs waiting to be leased (excludes in-flight).
    pub fn ready_len(&self) -> usize {
        self.inner.lock().ready.len()
    }

    /// Removes the lease entry if `leased` still owns it.
    fn take_owned(inner: &mut Inner, leased: &LeasedJob) -> Option<Entry> {
        let id = leased.job.id;
        match inner.leased.get(&id) {
            Some(entry) if entry.attempts == leased.attempts => inner.leased.remove(&id),
            Some(_) => {
                warn!(job_id = %id, attempt = leased.attempts, "Lease superseded by a newer delivery");
                None
            }
            None => {
                debug!(job_id = %id, "Lease no longer held");
                None
            }
        }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(Duration::from_secs(90))
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn enqueue(&self, job: &SyncJob) -> Result<()> {
        self.inner.lock().ready.push_back(Entry {
            job: job.clone(),
            attempts: 0,
            available_at: Instant::now(),
            leased_at: None,
        });
        Ok(())
    }

    async fn lease(&self, max: usize) -> Result<Vec<LeasedJob>> {
        let now = Instant::now();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        // Expired leases go back to the head of the queue.
        let expired: Vec<Uuid> = inner
            .leased
            .iter()
            .filter(|(_, e)| {
                e.leased_at
                    .is_some_and(|at| now.duration_since(at) >= self.lease_timeout)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some(mut entry) = inner.leased.remove(&id) {
                warn!(job_id = %id, attempt = entry.attempts, "Lease expired, redelivering");
                entry.leased_at = None;
                inner.ready.push_front(entry);
            }
        }

        let mut out = Vec::new();
        let mut remaining = VecDeque::with_capacity(inner.ready.len());

        while let Some(mut entry) = inner.ready.pop_front() {
            if out.len() < max && entry.available_at <= now {
                entry.attempts += 1;
                entry.leased_at = Some(now);
                out.push(LeasedJob {
                    job: entry.job.clone(),
                    attempts: entry.attempts,
                    receipt: Receipt::Row(entry.job.id),
                });
                inner.leased.insert(entry.job.id, entry);
            } else {
                remaining.push_back(entry);
            }
        }
        inner.ready = remaining;

        Ok(out)
    }

    async fn ack(&self, leased: &LeasedJob) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::take_owned(&mut inner, leased);
        Ok(())
    }

    async fn retry(&self, leased: &LeasedJob, delay: Duration) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(mut entry) = Self::take_owned(&mut inner, leased) {
            entry.leased_at = None;
            entry.available_at = Instant::now() + delay;
            inner.ready.push_back(entry);
        }
        Ok(())
    }

    async fn dead_letter(&self, leased: &LeasedJob, error: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(entry) = Self::take_owned(&mut inner, leased) {
            inner.dead.push(DeadJob {
                job: entry.job,
                attempts: entry.attempts,
                error: error.to_string(),
                failed_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn depth(&self) -> Result<u64> {
        let inner = self.inner.lock();
        Ok((inner.ready.len() + inner.leased.len()) as u64)
    }

    async fn failed_count(&self) -> Result<u64> {
        Ok(self.inner.lock().dead.len() as u64)
    }

    async fn health_check(&self) -> bool {
        true
    }
}
