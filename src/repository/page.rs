//! Diesel-based page repository.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{NewPage, PageOcrChangeset, PageOcrClearChangeset, PageRecord};
use super::pool::DbPool;
use super::{format_datetime, parse_datetime, parse_json_opt, RepositoryError, Result};
use crate::models::{OcrOutput, Page, PageStatus};
use crate::schema::pages;
use crate::with_conn;

/// Convert a database record to a domain model.
impl TryFrom<PageRecord> for Page {
    type Error = diesel::result::Error;

    fn try_from(record: PageRecord) -> std::result::Result<Self, Self::Error> {
        Ok(Page {
            ingestion_status: PageStatus::from_str(&record.ingestion_status).ok_or_else(|| {
                diesel::result::Error::DeserializationError(
                    format!("Invalid page status: '{}'", record.ingestion_status).into(),
                )
            })?,
            id: record.id,
            issue_id: record.issue_id,
            page_number: record.page_number,
            image_path: record.image_path,
            ocr_text: record.ocr_text,
            ocr_confidence: record.ocr_confidence,
            ocr_provider: record.ocr_provider,
            ocr_version: record.ocr_version,
            ocr_meta: parse_json_opt(record.ocr_meta),
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        })
    }
}

/// Diesel-based page repository.
#[derive(Clone)]
pub struct PageRepository {
    pool: DbPool,
}

impl PageRepository {
    /// Create a new repository with an existing pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    crud_methods!(
        table: pages,
        record: PageRecord,
        model: Page,
        order: (pages::issue_id.asc(), pages::page_number.asc())
    );

    /// Get a page by its position within an issue.
    pub async fn get_by_issue_and_number(
        &self,
        issue_id: &str,
        page_number: i32,
    ) -> Result<Option<Page>> {
        with_conn!(self.pool, conn, {
            let record = pages::table
                .filter(pages::issue_id.eq(issue_id))
                .filter(pages::page_number.eq(page_number))
                .select(PageRecord::as_select())
                .first::<PageRecord>(&mut conn)
                .await
                .optional()?;
            record
                .map(Page::try_from)
                .transpose()
                .map_err(RepositoryError::from)
        })
    }

    /// Return the page at `(issue_id, page_number)`, inserting it if missing.
    ///
    /// An existing page keeps its stored image path and status.
    pub async fn create_or_get(
        &self,
        issue_id: &str,
        page_number: i32,
        image_path: &str,
        status: PageStatus,
    ) -> Result<Page> {
        if let Some(existing) = self.get_by_issue_and_number(issue_id, page_number).await? {
            return Ok(existing);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = format_datetime(&Utc::now());
        let new = NewPage {
            id: &id,
            issue_id,
            page_number,
            image_path,
            ingestion_status: status.as_str(),
            created_at: &now,
            updated_at: &now,
        };

        with_conn!(self.pool, conn, {
            diesel::insert_into(pages::table)
                .values(&new)
                .on_conflict((pages::issue_id, pages::page_number))
                .do_nothing()
                .execute(&mut conn)
                .await?
        });

        self.get_by_issue_and_number(issue_id, page_number)
            .await?
            .ok_or(RepositoryError::WriteFailed {
                action: "upsert",
                table: "pages",
            })
    }

    /// Store OCR output for a page and set its status (normally `OcrCompleted`).
    pub async fn update_ocr(
        &self,
        page_id: &str,
        ocr: &OcrOutput,
        status: PageStatus,
    ) -> Result<Page> {
        let meta = ocr.meta.as_ref().map(serde_json::to_string).transpose()?;
        let now = format_datetime(&Utc::now());
        let changes = PageOcrChangeset {
            ocr_text: &ocr.text,
            ocr_confidence: ocr.confidence,
            ocr_provider: &ocr.provider,
            ocr_version: ocr.version.as_deref(),
            ocr_meta: meta.as_deref(),
            ingestion_status: status.as_str(),
            updated_at: &now,
        };

        let rows = with_conn!(self.pool, conn, {
            diesel::update(pages::table.find(page_id))
                .set(&changes)
                .execute(&mut conn)
                .await?
        });

        self.reload(page_id, rows, "update").await
    }

    /// Set a page's ingestion status.
    ///
    /// Moving to a state without OCR output (e.g. `OcrFailed`) clears the
    /// `ocr_*` columns so they never describe an earlier scan.
    pub async fn update_status(&self, page_id: &str, status: PageStatus) -> Result<Page> {
        let now = format_datetime(&Utc::now());

        let rows = with_conn!(self.pool, conn, {
            let target = diesel::update(pages::table.find(page_id));
            if status.has_ocr() {
                target
                    .set((
                        pages::ingestion_status.eq(status.as_str()),
                        pages::updated_at.eq(&now),
                    ))
                    .execute(&mut conn)
                    .await?
            } else {
                target
                    .set(&PageOcrClearChangeset::new(status.as_str(), &now))
                    .execute(&mut conn)
                    .await?
            }
        });

        self.reload(page_id, rows, "update").await
    }

    /// Point a page at a freshly stored image and put it back in line for OCR.
    pub async fn replace_image(&self, page_id: &str, image_path: &str) -> Result<Page> {
        let now = format_datetime(&Utc::now());
        let changes = PageOcrClearChangeset::new(PageStatus::OcrPending.as_str(), &now);

        let rows = with_conn!(self.pool, conn, {
            diesel::update(pages::table.find(page_id))
                .set((pages::image_path.eq(image_path), &changes))
                .execute(&mut conn)
                .await?
        });

        self.reload(page_id, rows, "update").await
    }

    /// Delete the pages of an issue numbered above `last_page`, returning them.
    pub async fn delete_beyond(&self, issue_id: &str, last_page: i32) -> Result<Vec<Page>> {
        let removed: Vec<Page> = self
            .list_by_issue(issue_id)
            .await?
            .into_iter()
            .filter(|p| p.page_number > last_page)
            .collect();
        if removed.is_empty() {
            return Ok(removed);
        }

        with_conn!(self.pool, conn, {
            diesel::delete(
                pages::table
                    .filter(pages::issue_id.eq(issue_id))
                    .filter(pages::page_number.gt(last_page)),
            )
            .execute(&mut conn)
            .await?
        });

        Ok(removed)
    }

    /// All pages of an issue in reading order.
    pub async fn list_by_issue(&self, issue_id: &str) -> Result<Vec<Page>> {
        with_conn!(self.pool, conn, {
            let records = pages::table
                .filter(pages::issue_id.eq(issue_id))
                .select(PageRecord::as_select())
                .order(pages::page_number.asc())
                .load::<PageRecord>(&mut conn)
                .await?;
            records
                .into_iter()
                .map(|r| Page::try_from(r).map_err(RepositoryError::from))
                .collect()
        })
    }

    /// Pages in a given ingestion status, oldest first.
    pub async fn list_by_status(&self, status: PageStatus, limit: i64) -> Result<Vec<Page>> {
        with_conn!(self.pool, conn, {
            let records = pages::table
                .filter(pages::ingestion_status.eq(status.as_str()))
                .select(PageRecord::as_select())
                .order((pages::created_at.asc(), pages::id.asc()))
                .limit(limit)
                .load::<PageRecord>(&mut conn)
                .await?;
            records
                .into_iter()
                .map(|r| Page::try_from(r).map_err(RepositoryError::from))
                .collect()
        })
    }

    async fn reload(&self, page_id: &str, rows: usize, action: &'static str) -> Result<Page> {
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "page",
                id: page_id.to_string(),
            });
        }
        self.get_by_id(page_id)
            .await?
            .ok_or(RepositoryError::WriteFailed {
                action,
                table: "pages",
            })
    }
}
