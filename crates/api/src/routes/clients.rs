//! Client read endpoints and write requests.
//!
//! Reads go to the target store. Writes are validated, normalized and
//! published as sync jobs; the response is 202 once the job is queued.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sync_core::{
    limits::{clamp_per_page, MAX_SEARCH_RESULTS},
    normalize, ClientInput, ClientPage, ClientQuery, ClientUpdate, SyncAction, SyncJob,
    TargetRecord, DEFAULT_STATUS, INACTIVE_STATUS,
};
use tracing::info;
use validator::{Validate, ValidateEmail};

use crate::extractors::ClientId;
use crate::response::{ApiError, ApiResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub statut: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// Body of a 202 response.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job_id: String,
    pub email: String,
    pub action: SyncAction,
}

impl From<&SyncJob> for QueuedJob {
    fn from(job: &SyncJob) -> Self {
        Self {
            job_id: job.id.to_string(),
            email: job.email().to_string(),
            action: job.action(),
        }
    }
}

/// GET /v1/clients?page&per_page&statut
pub async fn list_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiResponse<ClientPage>>, ApiError> {
    if let Some(statut) = params.statut.as_deref() {
        if statut != DEFAULT_STATUS && statut != INACTIVE_STATUS {
            return Err(ApiError::bad_request(format!("Unknown statut: {statut}")));
        }
    }

    let query = ClientQuery {
        statut: params.statut,
        page: params.page.unwrap_or(1).max(1),
        per_page: clamp_per_page(params.per_page),
    };
    let page = state.target.list(&query).await?;
    Ok(Json(ApiResponse::ok(page)))
}

/// GET /v1/clients/search?q
pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<Vec<TargetRecord>>>, ApiError> {
    let term = params.q.as_deref().map(str::trim).unwrap_or_default();
    if term.is_empty() {
        return Err(ApiError::bad_request("Search term is required"));
    }

    let results = state.target.search(term, MAX_SEARCH_RESULTS).await?;
    Ok(Json(ApiResponse::ok(results)))
}

/// GET /v1/clients/:id
pub async fn show_handler(
    State(state): State<AppState>,
    ClientId(id): ClientId,
) -> Result<Json<ApiResponse<TargetRecord>>, ApiError> {
    state
        .target
        .get(id)
        .await?
        .map(|record| Json(ApiResponse::ok(record)))
        .ok_or_else(|| ApiError::not_found(format!("Client {id} not found")))
}

type Accepted = (StatusCode, Json<ApiResponse<QueuedJob>>);

async fn enqueue(state: &AppState, job: SyncJob) -> Result<Accepted, ApiError> {
    if !state.publisher.publish_job(&job).await {
        return Err(ApiError::unavailable("QUEUE_001", "Sync job could not be queued"));
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::ok(QueuedJob::from(&job)).with_message("Queued for sync")),
    ))
}

/// POST /v1/clients - Validates, normalizes and queues an upsert.
pub async fn store_handler(
    State(state): State<AppState>,
    Json(input): Json<ClientInput>,
) -> Result<Accepted, ApiError> {
    input.validate()?;

    let record = normalize(input.into_raw(Utc::now()));
    let job = SyncJob::new(record, SyncAction::Upsert);
    info!(email = %job.email(), "Client upsert requested");
    enqueue(&state, job).await
}

/// PUT /v1/clients/:id - Merges validated fields over the live row and
/// queues an upsert versioned at request time.
///
/// An email change also queues a delete of the old email, since rows are
/// keyed by email.
pub async fn update_handler(
    State(state): State<AppState>,
    ClientId(id): ClientId,
    Json(input): Json<ClientUpdate>,
) -> Result<Accepted, ApiError> {
    let current = state
        .target
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Client {id} not found")))?;
    input.validate()?;

    let now = Utc::now();
    let previous_email = current.email.clone();
    let record = normalize(input.merge_into(current, now));

    if record.email != previous_email {
        if let Some(other) = state.target.find_by_email(&record.email).await? {
            if !other.is_tombstoned() {
                return Err(ApiError::validation(vec![format!(
                    "email: {} is already taken",
                    record.email
                )]));
            }
        }
        enqueue(&state, SyncJob::delete(previous_email, now)).await?;
    }

    let job = SyncJob::new(record, SyncAction::Upsert);
    info!(id = id, email = %job.email(), "Client update requested");
    enqueue(&state, job).await
}

/// DELETE /v1/clients/:email - Queues a tombstone.
pub async fn destroy_handler(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Accepted, ApiError> {
    if !email.validate_email() {
        return Err(ApiError::bad_request(format!("Invalid email: {email}")));
    }

    let job = SyncJob::delete(email, Utc::now());
    info!(email = %job.email(), "Client delete requested");
    enqueue(&state, job).await
}
