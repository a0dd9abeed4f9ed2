//! Issue browse endpoints.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::super::{ApiError, AppState};
use super::types::{parse_id, IssueResponse, PageParams, Paginated};

/// Query parameters for the issue listing.
#[derive(Debug, Deserialize)]
pub struct IssuesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Only issues of this newspaper.
    pub newspaper_id: Option<String>,
}

/// List issues, newest first.
pub async fn list_issues(
    State(state): State<AppState>,
    query: Result<Query<IssuesQuery>, QueryRejection>,
) -> Result<Json<Paginated<IssueResponse>>, ApiError> {
    let Query(params) = query.map_err(|e| ApiError::Validation(e.body_text()))?;
    let (limit, offset) = PageParams {
        limit: params.limit,
        offset: params.offset,
    }
    .resolve()?;

    let issues = match params.newspaper_id {
        Some(ref newspaper_id) => {
            let newspaper_id = parse_id(newspaper_id, "newspaper")?;
            state
                .issues
                .list_by_newspaper(&newspaper_id, limit + 1, offset, true)
                .await?
        }
        None => state.issues.list_all(limit + 1, offset).await?,
    };

    Ok(Json(Paginated::from_overfetch(issues, limit, offset)))
}

/// Issue detail with its newspaper and pages.
pub async fn get_issue(
    State(state): State<AppState>,
    Path(issue_id): Path<String>,
) -> Result<Json<IssueResponse>, ApiError> {
    let issue_id = parse_id(&issue_id, "issue")?;

    let issue = state
        .issues
        .get_by_id(&issue_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Issue not found".to_string()))?;

    let newspaper = state
        .newspapers
        .get_by_id(&issue.newspaper_id)
        .await?
        .ok_or_else(|| {
            tracing::error!(
                "Issue {} references missing newspaper {}",
                issue.id,
                issue.newspaper_id
            );
            ApiError::Integrity("Associated newspaper not found".to_string())
        })?;

    let pages = state.pages.list_by_issue(&issue.id).await?;

    Ok(Json(IssueResponse::detail(issue, newspaper, pages)))
}
