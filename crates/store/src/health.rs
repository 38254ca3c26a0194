//! Store health checks and schema bootstrap.

use crate::schema::{source_tables, target_tables};
use sqlx::PgPool;
use sync_core::{Error, Result};
use tracing::{debug, error};

/// Check a PostgreSQL pool can serve a query.
pub async fn check_connection(pool: &PgPool, component: &str) -> bool {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => {
            debug!(component = component, "PostgreSQL connection healthy");
            true
        }
        Err(e) => {
            error!(component = component, "PostgreSQL health check failed: {}", e);
            false
        }
    }
}

async fn run_ddl(pool: &PgPool, ddl: &[&str]) -> Result<()> {
    for statement in ddl {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| Error::database(format!("Failed to execute DDL: {}", e)))?;
    }
    Ok(())
}

/// Initialize the target schema.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    run_ddl(pool, target_tables()).await?;
    debug!("Target schema initialized");
    Ok(())
}

/// Create the source table. Only used for local and test databases.
pub async fn init_source_schema(pool: &PgPool) -> Result<()> {
    run_ddl(pool, source_tables()).await?;
    debug!("Source schema initialized");
    Ok(())
}
