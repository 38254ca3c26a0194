//! Unified error types for the sync pipeline.
//!
//! Error codes:
//! - SRC_001: Source store unavailable
//! - QUEUE_001-002: Publish and queue backend errors
//! - SYNC_001: Target apply errors
//! - DB_001: Database errors
//! - VALID_001: Validation errors
//! - CONFIG_001: Configuration errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// SRC_001: Source store unreachable or query failed
    SourceUnavailable,
    /// QUEUE_001: Job could not be enqueued
    PublishFailed,
    /// QUEUE_002: Queue backend failure (lease, ack, retry, dead-letter)
    QueueBackend,
    /// SYNC_001: Target transaction failed
    ApplyFailed,
    /// DB_001: Generic database failure
    Database,
    /// VALID_001: Invalid input
    Validation,
    /// CONFIG_001: Invalid configuration
    Config,
}

impl ErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SourceUnavailable => "SRC_001",
            Self::PublishFailed => "QUEUE_001",
            Self::QueueBackend => "QUEUE_002",
            Self::ApplyFailed => "SYNC_001",
            Self::Database => "DB_001",
            Self::Validation => "VALID_001",
            Self::Config => "CONFIG_001",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::SourceUnavailable => 503,
            Self::PublishFailed => 503,
            Self::QueueBackend => 503,
            Self::ApplyFailed => 500,
            Self::Database => 500,
            Self::Validation => 422,
            Self::Config => 500,
        }
    }
}

/// Unified error type for the sync pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("[SRC_001] source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("[QUEUE_001] publish failed: {0}")]
    Publish(String),

    #[error("[QUEUE_002] queue error: {0}")]
    Queue(String),

    #[error("[SYNC_001] apply failed for {email}: {message}")]
    Apply { email: String, message: String },

    #[error("[DB_001] database error: {0}")]
    Database(String),

    #[error("[VALID_001] validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("[CONFIG_001] configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }

    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    pub fn apply(email: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Apply {
            email: email.into(),
            message: msg.into(),
        }
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the coded category, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::SourceUnavailable(_) => Some(ErrorCode::SourceUnavailable),
            Self::Publish(_) => Some(ErrorCode::PublishFailed),
            Self::Queue(_) => Some(ErrorCode::QueueBackend),
            Self::Apply { .. } => Some(ErrorCode::ApplyFailed),
            Self::Database(_) => Some(ErrorCode::Database),
            Self::Validation(_) => Some(ErrorCode::Validation),
            Self::Config(_) => Some(ErrorCode::Config),
            Self::NotFound(_) | Self::Serialization(_) | Self::Internal(_) => None,
        }
    }

    /// Get the error code string if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        self.code().map(|c| c.code())
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Serialization(_) => 400,
            Self::Internal(_) => 500,
            other => other.code().map(|c| c.http_status()).unwrap_or(500),
        }
    }
}
