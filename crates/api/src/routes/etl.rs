//! Manual ETL trigger.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct EtlRunResponse {
    pub enqueued: usize,
}

/// POST /v1/etl/run - Runs one extraction pass and reports the jobs enqueued.
pub async fn run_handler(State(state): State<AppState>) -> Json<ApiResponse<EtlRunResponse>> {
    info!("ETL run requested over HTTP");
    let enqueued = state.orchestrator.run_once().await;

    Json(
        ApiResponse::ok(EtlRunResponse { enqueued })
            .with_message(format!("{enqueued} records queued for sync")),
    )
}
