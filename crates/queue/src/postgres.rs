//! PostgreSQL-backed queue.
//!
//! One row per job in `jobs`; leasing uses `FOR UPDATE SKIP LOCKED` so
//! concurrent workers (in one process or many) never share a job. Dead
//! letters move to `failed_jobs` in the same transaction that deletes the
//! job row.

use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use sync_core::{Error, Result, SyncJob};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::{JobQueue, LeasedJob, Receipt};

/// DDL for the queue tables.
pub const QUEUE_TABLES: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS jobs (
        id UUID PRIMARY KEY,
        queue TEXT NOT NULL,
        payload JSONB NOT NULL,
        attempts INTEGER NOT NULL DEFAULT 0,
        reserved_at TIMESTAMPTZ,
        available_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS jobs_queue_available_idx
        ON jobs (queue, available_at)
    ",
    r"
    CREATE TABLE IF NOT EXISTS failed_jobs (
        id UUID PRIMARY KEY,
        queue TEXT NOT NULL,
        payload JSONB NOT NULL,
        attempts INTEGER NOT NULL,
        error TEXT NOT NULL,
        failed_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    ",
];

#[derive(Debug, sqlx::FromRow)]
struct LeasedRow {
    id: Uuid,
    payload: serde_json::Value,
    attempts: i32,
}

fn queue_err(e: sqlx::Error) -> Error {
    Error::queue(e.to_string())
}

/// [`JobQueue`] over the `jobs` and `failed_jobs` tables.
#[derive(Debug, Clone)]
pub struct PgQueue {
    pool: PgPool,
    queue: String,
    lease_timeout: Duration,
}

impl PgQueue {
    pub fn new(pool: PgPool, queue: impl Into<String>, lease_timeout: Duration) -> Self {
        Self {
            pool,
            queue: queue.into(),
            lease_timeout,
        }
    }

    /// Creates the queue tables if missing.
    pub async fn init_schema(&self) -> Result<()> {
        for ddl in QUEUE_TABLES {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(|e| Error::database(format!("Failed to execute DDL: {}", e)))?;
        }
        debug!(queue = %self.queue, "Queue schema initialized");
        Ok(())
    }

    /// Moves an undecodable row straight to `failed_jobs`.
    async fn quarantine(&self, id: Uuid, attempts: i32, reason: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(queue_err)?;

        let payload: Option<serde_json::Value> =
            sqlx::query_scalar("DELETE FROM jobs WHERE id = $1 RETURNING payload")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(queue_err)?;

        if let Some(payload) = payload {
            sqlx::query(
                r"
                INSERT INTO failed_jobs (id, queue, payload, attempts, error)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(id)
            .bind(&self.queue)
            .bind(payload)
            .bind(attempts)
            .bind(reason)
            .execute(&mut *tx)
            .await
            .map_err(queue_err)?;
        }

        tx.commit().await.map_err(queue_err)
    }
}

fn row_id(leased: &LeasedJob) -> Uuid {
    match leased.receipt {
        Receipt::Row(id) => id,
        Receipt::Offset { .. } => leased.job.id,
    }
}

#[async_trait]
impl JobQueue for PgQueue {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn enqueue(&self, job: &SyncJob) -> Result<()> {
        let payload = serde_json::to_value(job)?;

        sqlx::query(
            r"
            INSERT INTO jobs (id, queue, payload, available_at, created_at)
            VALUES ($1, $2, $3, now(), $4)
            ",
        )
        .bind(job.id)
        .bind(&self.queue)
        .bind(payload)
        .bind(job.enqueued_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::publish(e.to_string()))?;

        Ok(())
    }

    async fn lease(&self, max: usize) -> Result<Vec<LeasedJob>> {
        if max == 0 {
            return Ok(Vec::new());
        }

        let rows: Vec<LeasedRow> = sqlx::query_as(
            r"
            UPDATE jobs
            SET reserved_at = now(), attempts = attempts + 1
            WHERE id IN (
                SELECT id FROM jobs
                WHERE queue = $1
                  AND available_at <= now()
                  AND (reserved_at IS NULL OR reserved_at < now() - make_interval(secs => $2))
                ORDER BY available_at, created_at
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, payload, attempts
            ",
        )
        .bind(&self.queue)
        .bind(self.lease_timeout.as_secs_f64())
        .bind(max as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(queue_err)?;

        let mut leased = Vec::with_capacity(rows.len());
        for row in rows {
            if row.attempts > 1 {
                debug!(job_id = %row.id, attempt = row.attempts, "Redelivering job");
            }

            match serde_json::from_value::<SyncJob>(row.payload) {
                Ok(job) => leased.push(LeasedJob {
                    job,
                    attempts: row.attempts.max(1) as u32,
                    receipt: Receipt::Row(row.id),
                }),
                Err(e) => {
                    error!(job_id = %row.id, error = %e, "Undecodable job payload, quarantining");
                    if let Err(qe) = self
                        .quarantine(row.id, row.attempts, &format!("undecodable payload: {e}"))
                        .await
                    {
                        warn!(job_id = %row.id, error = %qe, "Failed to quarantine job");
                    }
                }
            }
        }

        Ok(leased)
    }

    async fn ack(&self, leased: &LeasedJob) -> Result<()> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1 AND attempts = $2")
            .bind(row_id(leased))
            .bind(leased.attempts as i32)
            .execute(&self.pool)
            .await
            .map_err(queue_err)?;

        if result.rows_affected() == 0 {
            warn!(job_id = %leased.job.id, attempt = leased.attempts, "Ack for a lease no longer held");
        }
        Ok(())
    }

    async fn retry(&self, leased: &LeasedJob, delay: Duration) -> Result<()> {
        sqlx::query(
            r"
            UPDATE jobs
            SET reserved_at = NULL, available_at = now() + make_interval(secs => $2)
            WHERE id = $1 AND attempts = $3
            ",
        )
        .bind(row_id(leased))
        .bind(delay.as_secs_f64())
        .bind(leased.attempts as i32)
        .execute(&self.pool)
        .await
        .map_err(queue_err)?;

        Ok(())
    }

    async fn dead_letter(&self, leased: &LeasedJob, error: &str) -> Result<()> {
        let id = row_id(leased);
        let mut tx = self.pool.begin().await.map_err(queue_err)?;

        let payload: Option<serde_json::Value> = sqlx::query_scalar(
            "DELETE FROM jobs WHERE id = $1 AND attempts = $2 RETURNING payload",
        )
        .bind(id)
        .bind(leased.attempts as i32)
        .fetch_optional(&mut *tx)
        .await
        .map_err(queue_err)?;

        let Some(payload) = payload else {
            warn!(job_id = %id, "Dead-letter for a lease no longer held");
            return Ok(());
        };

        sqlx::query(
            r"
            INSERT INTO failed_jobs (id, queue, payload, attempts, error)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET attempts = EXCLUDED.attempts, error = EXCLUDED.error, failed_at = now()
            ",
        )
        .bind(id)
        .bind(&self.queue)
        .bind(payload)
        .bind(leased.attempts as i32)
        .bind(error)
        .execute(&mut *tx)
        .await
        .map_err(queue_err)?;

        tx.commit().await.map_err(queue_err)?;

        info!(job_id = %id, attempts = leased.attempts, "Job moved to failed_jobs");
        Ok(())
    }

    async fn depth(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE queue = $1")
            .bind(&self.queue)
            .fetch_one(&self.pool)
            .await
            .map_err(queue_err)?;
        Ok(count.max(0) as u64)
    }

    async fn failed_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM failed_jobs WHERE queue = $1")
            .bind(&self.queue)
            .fetch_one(&self.pool)
            .await
            .map_err(queue_err)?;
        Ok(count.max(0) as u64)
    }

    async fn health_check(&self) -> bool {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => true,
            Err(e) => {
                error!("Queue health check failed: {}", e);
                false
            }
        }
    }
}
