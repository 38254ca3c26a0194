//! Connection pools for the source and target databases.

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;
use sync_core::{Error, Result};
use tracing::info;

use crate::config::DatabaseConfig;

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
}

/// Connects to the target database, failing if it is unreachable.
pub async fn connect_target(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = pool_options(config)
        .connect(&config.url)
        .await
        .map_err(|e| Error::database(format!("Failed to connect to target: {}", e)))?;

    info!(max_connections = config.max_connections, "Connected to target database");
    Ok(pool)
}

/// Builds a lazy, read-only pool for the source database.
///
/// No connection is opened here, so an unreachable source does not stop
/// startup; extraction reports it instead. Every session runs with
/// `default_transaction_read_only = on`.
pub fn connect_source(config: &DatabaseConfig) -> Result<PgPool> {
    let options = PgConnectOptions::from_str(&config.url)
        .map_err(|e| Error::config(format!("Invalid source URL: {}", e)))?
        .options([("default_transaction_read_only", "on")]);

    let pool = pool_options(config).connect_lazy_with(options);

    info!(max_connections = config.max_connections, "Configured read-only source pool");
    Ok(pool)
}
