//! Admin endpoints for ingest jobs.

use async_trait::async_trait;
use axum::{
    extract::{rejection::QueryRejection, FromRequestParts, Path, Query, State},
    http::request::Parts,
    Json,
};
use serde::Deserialize;

use super::super::{ApiError, AppState};
use super::types::{JobResponse, PageParams, Paginated};
use crate::models::JobStatus;

/// Header carrying the admin key.
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Extractor that admits only requests carrying the configured admin key.
///
/// With no key configured every request is rejected.
pub struct AdminKey;

#[async_trait]
impl FromRequestParts<AppState> for AdminKey {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let provided = parts
            .headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|v| v.to_str().ok());

        match (state.admin_api_key.as_deref(), provided) {
            (Some(expected), Some(given)) if expected == given => Ok(AdminKey),
            _ => Err(ApiError::Unauthorized),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// List ingest jobs, newest first, optionally by status.
pub async fn list_jobs(
    _admin: AdminKey,
    State(state): State<AppState>,
    query: Result<Query<JobsQuery>, QueryRejection>,
) -> Result<Json<Paginated<JobResponse>>, ApiError> {
    let Query(params) = query.map_err(|e| ApiError::Validation(e.body_text()))?;
    let (limit, offset) = PageParams {
        limit: params.limit,
        offset: params.offset,
    }
    .resolve()?;

    let jobs = match params.status.as_deref() {
        Some(s) => {
            let status = JobStatus::from_str(s)
                .ok_or_else(|| ApiError::Validation(format!("Unknown job status: '{}'", s)))?;
            state
                .ingest_jobs
                .list_by_status(status, limit + 1, offset)
                .await?
        }
        None => state.ingest_jobs.list_all(limit + 1, offset).await?,
    };

    Ok(Json(Paginated::from_overfetch(jobs, limit, offset)))
}

/// Look up a job by its idempotency key.
pub async fn get_job(
    _admin: AdminKey,
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state
        .ingest_jobs
        .get_by_key(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;

    Ok(Json(job.into()))
}
