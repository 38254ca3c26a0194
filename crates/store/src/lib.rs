//! PostgreSQL access for the client sync pipeline: the read-only source
//! table and the target store jobs are applied to.

pub mod client;
pub mod config;
pub mod health;
pub mod schema;
pub mod source;
pub mod target;

pub use client::*;
pub use config::*;
pub use source::{PgSource, SourceStore};
pub use target::{PgTarget, TargetStore};
