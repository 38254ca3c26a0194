//! Health check endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use telemetry::{health, metrics, HealthReport, HealthStatus};

use crate::state::AppState;

/// Full health check body.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: HealthStatus,
    pub source_connected: bool,
    pub target_connected: bool,
    pub queue_connected: bool,
    pub queue_backend: String,
    pub queue_depth: u64,
    pub report: HealthReport,
}

/// Probes every dependency and records the result in the health registry.
async fn probe(state: &AppState) -> (bool, bool, bool) {
    let (source, target, queue) = tokio::join!(
        state.source.health_check(),
        state.target.health_check(),
        state.queue.health_check(),
    );

    let registry = health();
    if source {
        registry.source.set_healthy();
    } else {
        registry.source.set_unhealthy("source store unreachable");
    }
    if target {
        registry.target.set_healthy();
    } else {
        registry.target.set_unhealthy("target store unreachable");
    }
    if queue {
        registry.queue.set_healthy();
    } else {
        registry.queue.set_unhealthy("queue backend unreachable");
    }

    (source, target, queue)
}

/// GET /v1/health - Checks source, target and queue. 503 unless all pass.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (source, target, queue) = probe(&state).await;
    let report = health().report();
    let all_ok = source && target && queue;

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            success: all_ok,
            status: report.status,
            source_connected: source,
            target_connected: target,
            queue_connected: queue,
            queue_backend: state.queue.backend().to_string(),
            queue_depth: metrics().queue_depth.get(),
            report,
        }),
    )
}

/// GET /v1/health/ready - Readiness probe (jobs can be accepted and applied).
pub async fn ready_handler(State(state): State<AppState>) -> StatusCode {
    let (_, target, queue) = probe(&state).await;
    if target && queue {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /v1/health/live - Liveness probe (service is running).
pub async fn live_handler() -> StatusCode {
    if health().is_alive() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
