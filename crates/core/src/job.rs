//! Sync job envelope carried by the work queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;
use crate::record::CanonicalRecord;

/// What a job does to the target store.
///
/// The wire tags `create`, `update` and `sync` all mean [`SyncAction::Upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Upsert,
    Delete,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::Upsert => write!(f, "upsert"),
            SyncAction::Delete => write!(f, "delete"),
        }
    }
}

impl FromStr for SyncAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" | "update" | "sync" | "upsert" => Ok(SyncAction::Upsert),
            "delete" => Ok(SyncAction::Delete),
            _ => Err(Error::validation(format!("Unknown sync action: {s}"))),
        }
    }
}

/// Job payload, tagged by action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncOperation {
    Upsert { record: CanonicalRecord },
    Delete { email: String },
}

/// An immutable unit of work for the sync workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: Uuid,
    #[serde(flatten)]
    pub operation: SyncOperation,
    /// Ordering key for same-email jobs; newer versions win.
    pub version: Option<DateTime<Utc>>,
    pub enqueued_at: DateTime<Utc>,
}

impl SyncJob {
    /// Builds a job for `record`.
    ///
    /// Delete jobs keep only the email. The version is the record's source
    /// timestamp.
    pub fn new(record: CanonicalRecord, action: SyncAction) -> Self {
        let version = record.updated_at;
        let operation = match action {
            SyncAction::Upsert => SyncOperation::Upsert { record },
            SyncAction::Delete => SyncOperation::Delete {
                email: record.email,
            },
        };

        Self {
            id: Uuid::new_v4(),
            operation,
            version,
            enqueued_at: Utc::now(),
        }
    }

    /// Builds a delete job for an email, versioned at `at`.
    pub fn delete(email: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation: SyncOperation::Delete {
                email: email.into().to_lowercase(),
            },
            version: Some(at),
            enqueued_at: Utc::now(),
        }
    }

    pub fn action(&self) -> SyncAction {
        match self.operation {
            SyncOperation::Upsert { .. } => SyncAction::Upsert,
            SyncOperation::Delete { .. } => SyncAction::Delete,
        }
    }

    /// The natural key this job targets.
    pub fn email(&self) -> &str {
        match &self.operation {
            SyncOperation::Upsert { record } => &record.email,
            SyncOperation::Delete { email } => email,
        }
    }

    pub fn to_json(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Result of applying one job to the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// A new row was inserted.
    Created,
    /// An existing row was overwritten (or revived from a tombstone).
    Updated,
    /// A live row was tombstoned.
    Tombstoned,
    /// Nothing to do: delete for an unknown or already tombstoned email.
    Noop,
    /// The stored row carries a newer version; the job was skipped.
    Stale,
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApplyOutcome::Created => "created",
            ApplyOutcome::Updated => "updated",
            ApplyOutcome::Tombstoned => "tombstoned",
            ApplyOutcome::Noop => "noop",
            ApplyOutcome::Stale => "stale",
        };
        f.write_str(s)
    }
}

/// Returns true when a job at `incoming` may overwrite a row at `stored`.
///
/// Unversioned jobs and unversioned rows always apply. Equal versions apply
/// so that redelivery is idempotent.
pub fn supersedes(incoming: Option<DateTime<Utc>>, stored: Option<DateTime<Utc>>) -> bool {
    match (incoming, stored) {
        (Some(incoming), Some(stored)) => incoming >= stored,
        _ => true,
    }
}
