//! Service status and stored page image handlers.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::super::AppState;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "service": "Time Browser API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// Serve a stored page image.
pub async fn serve_file(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let not_found = || (StatusCode::NOT_FOUND, Json(json!({ "detail": "File not found" })));

    let canonical_images_dir = match state.images_dir.canonicalize() {
        Ok(p) => p,
        Err(_) => return not_found().into_response(),
    };

    if path.contains("..") || path.starts_with('/') {
        return not_found().into_response();
    }

    let canonical_file = match canonical_images_dir.join(&path).canonicalize() {
        Ok(p) => p,
        Err(_) => return not_found().into_response(),
    };

    if !canonical_file.starts_with(&canonical_images_dir) || !canonical_file.is_file() {
        return not_found().into_response();
    }

    let content = match tokio::fs::read(&canonical_file).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to read {}: {}", canonical_file.display(), e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": "Failed to read file" })),
            )
                .into_response();
        }
    };

    let mime = mime_guess::from_path(&canonical_file)
        .first_or_octet_stream()
        .to_string();

    ([(header::CONTENT_TYPE, mime)], content).into_response()
}
