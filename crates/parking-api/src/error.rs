//! Error types for the query API.
//!
//! [`ApiError`] converts into an HTTP response carrying the same
//! `success` envelope the data endpoints use.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parking_db::DbError;
use tracing::error;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The event store query failed.
    #[error("store error: {0}")]
    Store(#[from] DbError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!(error = %self, status = status.as_u16(), "request failed");

        let body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
