//! Request extractors.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};

use crate::response::ApiError;

/// Numeric client id from the `:key` path segment.
///
/// A non-numeric segment is rejected with the standard error envelope.
#[derive(Debug, Clone, Copy)]
pub struct ClientId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for ClientId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;

        raw.parse::<i64>()
            .map(ClientId)
            .map_err(|_| ApiError::bad_request(format!("Invalid client id: {raw}")))
    }
}
