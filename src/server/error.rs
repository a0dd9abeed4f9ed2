//! HTTP error responses.
//!
//! Every error is rendered as JSON `{"detail": "<message>"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::repository::RepositoryError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    /// Stored data references something that no longer exists.
    #[error("{0}")]
    Integrity(String),

    #[error("{0}")]
    Validation(String),

    #[error("Invalid or missing admin key")]
    Unauthorized,

    #[error("Internal server error")]
    Internal(#[from] RepositoryError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Integrity(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Internal(ref e) => tracing::error!("Request failed: {}", e),
            Self::Integrity(ref msg) => tracing::error!("Data integrity error: {}", msg),
            _ => {}
        }

        (self.status(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
