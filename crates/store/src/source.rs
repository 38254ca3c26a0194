//! Read-only access to the upstream client table.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use sync_core::{Error, RawRecord, Result};
use tracing::debug;

/// Read interface to the source store.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Rows modified strictly after `cutoff`, oldest first.
    async fn changed_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<RawRecord>>;

    /// Total rows at the source.
    async fn count(&self) -> Result<u64>;

    async fn health_check(&self) -> bool;
}

#[derive(Debug, sqlx::FromRow)]
struct SourceRow {
    nom: String,
    prenom: String,
    email: String,
    telephone: Option<String>,
    adresse: Option<String>,
    ville: Option<String>,
    code_postal: Option<String>,
    date_naissance: Option<NaiveDate>,
    statut: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<SourceRow> for RawRecord {
    fn from(row: SourceRow) -> Self {
        RawRecord {
            nom: row.nom,
            prenom: row.prenom,
            email: row.email,
            telephone: row.telephone,
            adresse: row.adresse,
            ville: row.ville,
            code_postal: row.code_postal,
            date_naissance: row.date_naissance,
            statut: row.statut,
            updated_at: row.updated_at,
        }
    }
}

fn source_err(e: sqlx::Error) -> Error {
    Error::source_unavailable(e.to_string())
}

/// [`SourceStore`] over a PostgreSQL `clients` table.
#[derive(Debug, Clone)]
pub struct PgSource {
    pool: PgPool,
}

impl PgSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SourceStore for PgSource {
    async fn changed_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<RawRecord>> {
        // MIN_UTC is outside PostgreSQL's timestamp range; it means no lower bound.
        let bound = (cutoff > DateTime::<Utc>::MIN_UTC).then_some(cutoff);
        let rows: Vec<SourceRow> = sqlx::query_as(
            r"
            SELECT nom, prenom, email, telephone, adresse, ville, code_postal,
                   date_naissance, statut::text AS statut, updated_at
            FROM clients
            WHERE $1::timestamptz IS NULL OR updated_at > $1
            ORDER BY updated_at ASC
            ",
        )
        .bind(bound)
        .fetch_all(&self.pool)
        .await
        .map_err(source_err)?;

        debug!(cutoff = %cutoff, rows = rows.len(), "Queried source for changed rows");
        Ok(rows.into_iter().map(RawRecord::from).collect())
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clients")
            .fetch_one(&self.pool)
            .await
            .map_err(source_err)?;
        Ok(count.max(0) as u64)
    }

    async fn health_check(&self) -> bool {
        crate::health::check_connection(&self.pool, "source").await
    }
}
