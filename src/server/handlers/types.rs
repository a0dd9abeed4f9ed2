//! Response shapes and pagination for the JSON API.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::super::ApiError;
use crate::models::{IngestJob, Issue, JobProgress, Newspaper, Page};

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 100;

/// `limit` / `offset` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageParams {
    /// Validated `(limit, offset)`: limit in `1..=100` (default 50), offset ≥ 0.
    pub fn resolve(&self) -> Result<(i64, i64), ApiError> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(ApiError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }
        let offset = self.offset.unwrap_or(0);
        if offset < 0 {
            return Err(ApiError::Validation(
                "offset must be greater than or equal to 0".to_string(),
            ));
        }
        Ok((limit, offset))
    }
}

/// Paginated response wrapper.
///
/// `total` is not a count of the table: it is `offset + items.len()`, plus one
/// when more rows exist.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

impl<T> Paginated<T> {
    /// Build a page from rows fetched with `limit + 1`.
    pub fn from_overfetch<R>(mut rows: Vec<R>, limit: i64, offset: i64) -> Self
    where
        T: From<R>,
    {
        let has_more = rows.len() as i64 > limit;
        rows.truncate(limit.max(0) as usize);
        let total = offset + rows.len() as i64 + i64::from(has_more);

        Self {
            items: rows.into_iter().map(T::from).collect(),
            total,
            limit,
            offset,
            has_more,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NewspaperResponse {
    pub id: String,
    pub name: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub description: Option<String>,
    pub source_type: String,
    pub created_at: DateTime<Utc>,
}

impl From<Newspaper> for NewspaperResponse {
    fn from(n: Newspaper) -> Self {
        Self {
            id: n.id,
            name: n.name,
            city: n.city,
            country: n.country,
            start_year: n.start_year,
            end_year: n.end_year,
            description: n.description,
            source_type: n.source_type,
            created_at: n.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub id: String,
    pub issue_id: String,
    pub page_number: i32,
    pub image_path: String,
    pub ocr_text: Option<String>,
    pub ocr_confidence: Option<f64>,
    pub ocr_provider: Option<String>,
    pub ocr_version: Option<String>,
    pub ingestion_status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Page> for PageResponse {
    fn from(p: Page) -> Self {
        Self {
            id: p.id,
            issue_id: p.issue_id,
            page_number: p.page_number,
            image_path: p.image_path,
            ocr_text: p.ocr_text,
            ocr_confidence: p.ocr_confidence,
            ocr_provider: p.ocr_provider,
            ocr_version: p.ocr_version,
            ingestion_status: p.ingestion_status.to_string(),
            created_at: p.created_at,
        }
    }
}

/// An issue. `newspaper` and `pages` are only filled in on the detail route.
#[derive(Debug, Serialize)]
pub struct IssueResponse {
    pub id: String,
    pub newspaper_id: String,
    pub issue_date: NaiveDate,
    pub num_pages: i32,
    pub source_type: String,
    pub source_external_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub newspaper: Option<NewspaperResponse>,
    pub pages: Option<Vec<PageResponse>>,
}

impl IssueResponse {
    pub fn detail(issue: Issue, newspaper: Newspaper, pages: Vec<Page>) -> Self {
        let mut response = Self::from(issue);
        response.newspaper = Some(newspaper.into());
        response.pages = Some(pages.into_iter().map(PageResponse::from).collect());
        response
    }
}

impl From<Issue> for IssueResponse {
    fn from(i: Issue) -> Self {
        Self {
            id: i.id,
            newspaper_id: i.newspaper_id,
            issue_date: i.issue_date,
            num_pages: i.num_pages,
            source_type: i.source_type,
            source_external_id: i.source_external_id,
            metadata: i.metadata,
            created_at: i.created_at,
            newspaper: None,
            pages: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub idempotency_key: String,
    pub issue_id: Option<String>,
    pub status: String,
    pub progress: JobProgress,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<IngestJob> for JobResponse {
    fn from(j: IngestJob) -> Self {
        Self {
            id: j.id,
            idempotency_key: j.idempotency_key,
            issue_id: j.issue_id,
            status: j.status.to_string(),
            progress: j.progress,
            error_message: j.error_message,
            created_at: j.created_at,
            updated_at: j.updated_at,
        }
    }
}

/// Parse a UUID id in any accepted spelling into the stored lowercase
/// hyphenated form. Anything else is rejected before touching the store.
pub fn parse_id(id: &str, what: &str) -> Result<String, ApiError> {
    uuid::Uuid::parse_str(id)
        .map(|uuid| uuid.hyphenated().to_string())
        .map_err(|_| ApiError::Validation(format!("Invalid {} id: '{}'", what, id)))
}
