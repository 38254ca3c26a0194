//! Per-partition lease bookkeeping for fetched job records.
//!
//! Fetched records stay buffered until acknowledged. The committed
//! position is the lowest unfinished offset, so only the contiguous
//! finished prefix is ever considered consumed.

use chrono::{DateTime, Utc};
use job_queue::{LeasedJob, Receipt};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use sync_core::SyncJob;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
enum EntryState {
    Waiting,
    Leased(Instant),
}

#[derive(Debug)]
struct Entry {
    job: SyncJob,
    /// Deliveries made so far, including the current lease.
    attempts: u32,
    available_at: Option<DateTime<Utc>>,
    state: EntryState,
}

/// Buffered records and fetch position for one partition.
#[derive(Debug)]
pub struct Cursor {
    partition: i32,
    next_fetch: i64,
    entries: BTreeMap<i64, Entry>,
}

impl Cursor {
    pub fn new(partition: i32, start: i64) -> Self {
        Self {
            partition,
            next_fetch: start,
            entries: BTreeMap::new(),
        }
    }

    /// Offset the next fetch starts from.
    pub fn next_fetch(&self) -> i64 {
        self.next_fetch
    }

    /// First offset not yet finished.
    pub fn committed(&self) -> i64 {
        self.entries
            .keys()
            .next()
            .copied()
            .unwrap_or(self.next_fetch)
    }

    /// Records fetched but not finished.
    pub fn buffered(&self) -> usize {
        self.entries.len()
    }

    /// Buffers a fetched job. Offsets already seen are ignored.
    pub fn push(
        &mut self,
        offset: i64,
        job: SyncJob,
        attempts: u32,
        available_at: Option<DateTime<Utc>>,
    ) {
        if offset < self.next_fetch {
            return;
        }
        self.entries.insert(
            offset,
            Entry {
                job,
                attempts,
                available_at,
                state: EntryState::Waiting,
            },
        );
        self.next_fetch = offset + 1;
    }

    /// Moves past a record that will not be buffered.
    pub fn skip_to(&mut self, next: i64) {
        self.next_fetch = self.next_fetch.max(next);
    }

    /// Leases up to `max` due records, oldest offset first.
    ///
    /// Leases older than `lease_timeout` are reclaimed first and count as
    /// a new delivery when handed out again.
    pub fn lease(
        &mut self,
        max: usize,
        now: Instant,
        wall: DateTime<Utc>,
        lease_timeout: Duration,
    ) -> Vec<LeasedJob> {
        let mut out = Vec::new();

        for (offset, entry) in self.entries.iter_mut() {
            if let EntryState::Leased(at) = entry.state {
                if now.duration_since(at) >= lease_timeout {
                    warn!(
                        partition = self.partition,
                        offset = *offset,
                        attempt = entry.attempts,
                        "Lease expired, redelivering"
                    );
                    entry.state = EntryState::Waiting;
                }
            }

            if out.len() >= max || !matches!(entry.state, EntryState::Waiting) {
                continue;
            }
            if entry.available_at.is_some_and(|at| at > wall) {
                continue;
            }

            entry.attempts += 1;
            entry.state = EntryState::Leased(now);
            out.push(LeasedJob {
                job: entry.job.clone(),
                attempts: entry.attempts,
                receipt: Receipt::Offset {
                    partition: self.partition,
                    offset: *offset,
                },
            });
        }

        out
    }

    /// True while the delivery numbered `attempts` still holds `offset`.
    pub fn owns(&self, offset: i64, attempts: u32) -> bool {
        self.entries.get(&offset).is_some_and(|entry| {
            matches!(entry.state, EntryState::Leased(_)) && entry.attempts == attempts
        })
    }

    /// Finishes `offset` if still owned. Returns whether it was removed.
    pub fn release(&mut self, offset: i64, attempts: u32) -> bool {
        if self.owns(offset, attempts) {
            self.entries.remove(&offset);
            true
        } else {
            false
        }
    }
}
