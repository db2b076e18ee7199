//! Error types for the HTTP API.
//!
//! [`ApiError`] is the single failure type returned by handlers. Its
//! [`IntoResponse`](axum::response::IntoResponse) implementation renders a
//! `{"error": ..., "status": ...}` JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lunar_types::UnknownPhaseName;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A query parameter is missing or malformed.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// No route matches the request path.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<UnknownPhaseName> for ApiError {
    fn from(err: UnknownPhaseName) -> Self {
        Self::InvalidQuery(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::InvalidQuery(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
