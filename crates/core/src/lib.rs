//! Core types, normalization, and errors for the client sync pipeline.

pub mod error;
pub mod job;
pub mod limits;
pub mod normalize;
pub mod record;

pub use error::{Error, ErrorCode, Result};
pub use job::*;
pub use normalize::normalize;
pub use record::*;
