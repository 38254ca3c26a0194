//! Telemetry for the client sync pipeline: structured logging setup,
//! in-process metrics and the component health registry.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
