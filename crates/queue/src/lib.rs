//! Durable work queue for sync jobs.
//!
//! Backends:
//! - PostgreSQL (`jobs` / `failed_jobs` tables, SKIP LOCKED leasing)
//! - In-memory (development and tests)
//!
//! The Redpanda backend lives in the `redpanda` crate and implements the
//! same [`JobQueue`] trait.

pub mod backend;
pub mod config;
pub mod memory;
pub mod postgres;
pub mod retry;

pub use backend::*;
pub use config::*;
pub use memory::{DeadJob, MemoryQueue};
pub use postgres::PgQueue;
pub use retry::RetryPolicy;
