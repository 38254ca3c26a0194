//! Pipeline and store statistics.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sync_core::ClientStats;
use telemetry::{metrics, MetricsSnapshot};
use tracing::warn;

use crate::response::{ApiError, ApiResponse};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueStats {
    pub backend: String,
    pub jobs_pending: u64,
    pub jobs_failed: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseStats {
    /// `None` while the source is unreachable.
    pub source_clients: Option<u64>,
    pub target_clients: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStats {
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub clients: ClientStats,
    pub queue: QueueStats,
    pub database: DatabaseStats,
    pub pipeline: MetricsSnapshot,
    pub system: SystemStats,
}

/// GET /v1/stats
pub async fn stats_handler(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StatsResponse>>, ApiError> {
    let clients = state.target.stats().await?;
    let jobs_pending = state.queue.depth().await?;
    let jobs_failed = state.queue.failed_count().await?;

    let source_clients = match state.source.count().await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!(error = %e, "Source count unavailable");
            None
        }
    };

    let target_clients = clients.total;
    Ok(Json(ApiResponse::ok(StatsResponse {
        clients,
        queue: QueueStats {
            backend: state.queue.backend().to_string(),
            jobs_pending,
            jobs_failed,
        },
        database: DatabaseStats {
            source_clients,
            target_clients,
        },
        pipeline: metrics().snapshot(),
        system: SystemStats {
            timestamp: Utc::now(),
            uptime_secs: state.uptime_secs(),
        },
    })))
}
