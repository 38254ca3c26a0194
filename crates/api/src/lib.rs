//! HTTP API for the client sync pipeline.
//!
//! A thin collaborator: it reads the target store, triggers ETL runs and
//! publishes sync jobs, but never writes the target store itself.

pub mod extractors;
pub mod response;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;
