//! API routes.

pub mod clients;
pub mod etl;
pub mod health;
pub mod stats;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

fn v1() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .route("/stats", get(stats::stats_handler))
        .route("/etl/run", post(etl::run_handler))
        .route(
            "/clients",
            get(clients::list_handler).post(clients::store_handler),
        )
        .route("/clients/search", get(clients::search_handler))
        // One segment: numeric id for reads and updates, email for deletes.
        .route(
            "/clients/:key",
            get(clients::show_handler)
                .put(clients::update_handler)
                .delete(clients::destroy_handler),
        )
}

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/v1", v1())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}
