//! Target store: transactional upsert / tombstone by email, plus reads.
//!
//! Writes follow version ordering: a job only overwrites a row whose stored
//! `source_updated_at` is not newer than the job's version (see
//! [`sync_core::supersedes`]).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use sync_core::{
    supersedes, ApplyOutcome, CanonicalRecord, ClientPage, ClientQuery, ClientStats, Error,
    Result, TargetRecord, DEFAULT_STATUS, INACTIVE_STATUS,
};
use tracing::debug;

/// Write and read interface to the target store.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Inserts or overwrites the row for `record.email` in one transaction.
    async fn upsert(
        &self,
        record: &CanonicalRecord,
        version: Option<DateTime<Utc>>,
    ) -> Result<ApplyOutcome>;

    /// Tombstones the row for `email` in one transaction. No-op if absent.
    async fn tombstone(&self, email: &str, version: Option<DateTime<Utc>>)
        -> Result<ApplyOutcome>;

    /// Row for `email`, tombstoned or not.
    async fn find_by_email(&self, email: &str) -> Result<Option<TargetRecord>>;

    /// Live row by id.
    async fn get(&self, id: i64) -> Result<Option<TargetRecord>>;

    /// Live rows, newest first.
    async fn list(&self, query: &ClientQuery) -> Result<ClientPage>;

    /// Live rows whose nom, prenom, email or telephone contain `term`.
    async fn search(&self, term: &str, limit: u32) -> Result<Vec<TargetRecord>>;

    async fn stats(&self) -> Result<ClientStats>;

    async fn health_check(&self) -> bool;
}

#[derive(Debug, sqlx::FromRow)]
struct ClientRow {
    id: i64,
    nom: String,
    prenom: String,
    email: String,
    telephone: Option<String>,
    adresse: Option<String>,
    ville: Option<String>,
    code_postal: Option<String>,
    date_naissance: Option<NaiveDate>,
    statut: String,
    source_updated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<ClientRow> for TargetRecord {
    fn from(row: ClientRow) -> Self {
        TargetRecord {
            id: row.id,
            nom: row.nom,
            prenom: row.prenom,
            email: row.email,
            telephone: row.telephone,
            adresse: row.adresse,
            ville: row.ville,
            code_postal: row.code_postal,
            date_naissance: row.date_naissance,
            statut: row.statut,
            source_updated_at: row.source_updated_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StatsRow {
    total: i64,
    active: i64,
    inactive: i64,
    recent_24h: i64,
    tombstoned: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct LockedRow {
    source_updated_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

const CLIENT_COLUMNS: &str = "id, nom, prenom, email, telephone, adresse, ville, code_postal, \
     date_naissance, statut, source_updated_at, created_at, updated_at, deleted_at";

fn db_err(e: sqlx::Error) -> Error {
    Error::database(e.to_string())
}

fn apply_err(email: &str) -> impl Fn(sqlx::Error) -> Error + '_ {
    move |e| Error::apply(email, e.to_string())
}

/// Escapes LIKE wildcards so `term` matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// [`TargetStore`] over the PostgreSQL `clients` table.
#[derive(Debug, Clone)]
pub struct PgTarget {
    pool: PgPool,
}

impl PgTarget {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TargetStore for PgTarget {
    async fn upsert(
        &self,
        record: &CanonicalRecord,
        version: Option<DateTime<Utc>>,
    ) -> Result<ApplyOutcome> {
        let email = record.email.as_str();
        let mut tx = self.pool.begin().await.map_err(apply_err(email))?;

        // `xmax = 0` distinguishes a fresh insert from a conflict update.
        // The WHERE clause skips the update when the stored row is newer.
        let inserted: Option<bool> = sqlx::query_scalar(
            r"
            INSERT INTO clients (
                nom, prenom, email, telephone, adresse, ville, code_postal,
                date_naissance, statut, source_updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (email) DO UPDATE SET
                nom = EXCLUDED.nom,
                prenom = EXCLUDED.prenom,
                telephone = EXCLUDED.telephone,
                adresse = EXCLUDED.adresse,
                ville = EXCLUDED.ville,
                code_postal = EXCLUDED.code_postal,
                date_naissance = EXCLUDED.date_naissance,
                statut = EXCLUDED.statut,
                source_updated_at = COALESCE(EXCLUDED.source_updated_at, clients.source_updated_at),
                updated_at = now(),
                deleted_at = NULL
            WHERE clients.source_updated_at IS NULL
               OR EXCLUDED.source_updated_at IS NULL
               OR clients.source_updated_at <= EXCLUDED.source_updated_at
            RETURNING (xmax = 0) AS inserted
            ",
        )
        .bind(&record.nom)
        .bind(&record.prenom)
        .bind(email)
        .bind(&record.telephone)
        .bind(&record.adresse)
        .bind(&record.ville)
        .bind(&record.code_postal)
        .bind(record.date_naissance)
        .bind(&record.statut)
        .bind(version)
        .fetch_optional(&mut *tx)
        .await
        .map_err(apply_err(email))?;

        tx.commit().await.map_err(apply_err(email))?;

        let outcome = match inserted {
            Some(true) => ApplyOutcome::Created,
            Some(false) => ApplyOutcome::Updated,
            None => ApplyOutcome::Stale,
        };
        debug!(email = %email, outcome = %outcome, "Upsert committed");
        Ok(outcome)
    }

    async fn tombstone(
        &self,
        email: &str,
        version: Option<DateTime<Utc>>,
    ) -> Result<ApplyOutcome> {
        let mut tx = self.pool.begin().await.map_err(apply_err(email))?;

        let locked: Option<LockedRow> = sqlx::query_as(
            "SELECT source_updated_at, deleted_at FROM clients WHERE email = $1 FOR UPDATE",
        )
        .bind(email)
        .fetch_optional(&mut *tx)
        .await
        .map_err(apply_err(email))?;

        let outcome = match locked {
            None => ApplyOutcome::Noop,
            Some(row) if row.deleted_at.is_some() => ApplyOutcome::Noop,
            Some(row) if !supersedes(version, row.source_updated_at) => ApplyOutcome::Stale,
            Some(_) => {
                sqlx::query(
                    r"
                    UPDATE clients
                    SET deleted_at = now(),
                        updated_at = now(),
                        source_updated_at = COALESCE($2, source_updated_at)
                    WHERE email = $1
                    ",
                )
                .bind(email)
                .bind(version)
                .execute(&mut *tx)
                .await
                .map_err(apply_err(email))?;
                ApplyOutcome::Tombstoned
            }
        };

        tx.commit().await.map_err(apply_err(email))?;

        debug!(email = %email, outcome = %outcome, "Tombstone committed");
        Ok(outcome)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<TargetRecord>> {
        let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE email = $1");
        let row: Option<ClientRow> = sqlx::query_as(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(TargetRecord::from))
    }

    async fn get(&self, id: i64) -> Result<Option<TargetRecord>> {
        let sql =
            format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1 AND deleted_at IS NULL");
        let row: Option<ClientRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(TargetRecord::from))
    }

    async fn list(&self, query: &ClientQuery) -> Result<ClientPage> {
        let sql = format!(
            r"
            SELECT {CLIENT_COLUMNS} FROM clients
            WHERE deleted_at IS NULL AND ($1::text IS NULL OR statut = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        );
        let rows: Vec<ClientRow> = sqlx::query_as(&sql)
            .bind(&query.statut)
            .bind(i64::from(query.per_page))
            .bind(query.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM clients WHERE deleted_at IS NULL AND ($1::text IS NULL OR statut = $1)",
        )
        .bind(&query.statut)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(ClientPage {
            data: rows.into_iter().map(TargetRecord::from).collect(),
            page: query.page.max(1),
            per_page: query.per_page,
            total: total.max(0) as u64,
        })
    }

    async fn search(&self, term: &str, limit: u32) -> Result<Vec<TargetRecord>> {
        let sql = format!(
            r"
            SELECT {CLIENT_COLUMNS} FROM clients
            WHERE deleted_at IS NULL
              AND (nom ILIKE $1 OR prenom ILIKE $1 OR email ILIKE $1 OR telephone ILIKE $1)
            ORDER BY id
            LIMIT $2
            "
        );
        let rows: Vec<ClientRow> = sqlx::query_as(&sql)
            .bind(like_pattern(term))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(TargetRecord::from).collect())
    }

    async fn stats(&self) -> Result<ClientStats> {
        let row: StatsRow = sqlx::query_as(
            r"
            SELECT
                COUNT(*) FILTER (WHERE deleted_at IS NULL) AS total,
                COUNT(*) FILTER (WHERE deleted_at IS NULL AND statut = $1) AS active,
                COUNT(*) FILTER (WHERE deleted_at IS NULL AND statut = $2) AS inactive,
                COUNT(*) FILTER (WHERE deleted_at IS NULL AND created_at > now() - interval '1 day') AS recent_24h,
                COUNT(*) FILTER (WHERE deleted_at IS NOT NULL) AS tombstoned
            FROM clients
            ",
        )
        .bind(DEFAULT_STATUS)
        .bind(INACTIVE_STATUS)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(ClientStats {
            total: row.total.max(0) as u64,
            active: row.active.max(0) as u64,
            inactive: row.inactive.max(0) as u64,
            recent_24h: row.recent_24h.max(0) as u64,
            tombstoned: row.tombstoned.max(0) as u64,
        })
    }

    async fn health_check(&self) -> bool {
        crate::health::check_connection(&self.pool, "target").await
    }
}
