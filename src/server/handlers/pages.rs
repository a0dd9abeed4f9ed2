//! Page endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::super::{ApiError, AppState};
use super::types::{parse_id, PageResponse};

/// Single page with its OCR fields.
pub async fn get_page(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
) -> Result<Json<PageResponse>, ApiError> {
    let page_id = parse_id(&page_id, "page")?;

    let page = state
        .pages
        .get_by_id(&page_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Page not found".to_string()))?;

    Ok(Json(page.into()))
}
