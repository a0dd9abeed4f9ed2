//! Diesel ORM models for database tables.

use diesel::prelude::*;

use crate::schema;

/// Newspaper record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::newspapers)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewspaperRecord {
    pub id: String,
    pub name: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub description: Option<String>,
    pub source_type: String,
    pub created_at: String,
}

/// New newspaper for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::newspapers)]
pub struct NewNewspaper<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub city: Option<&'a str>,
    pub country: Option<&'a str>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub description: Option<&'a str>,
    pub source_type: &'a str,
    pub created_at: &'a str,
}

/// Issue record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::issues)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct IssueRecord {
    pub id: String,
    pub newspaper_id: String,
    pub issue_date: String,
    pub num_pages: i32,
    pub source_type: String,
    pub source_external_id: Option<String>,
    pub metadata: String,
    pub created_at: String,
}

/// New issue for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::issues)]
pub struct NewIssue<'a> {
    pub id: &'a str,
    pub newspaper_id: &'a str,
    pub issue_date: &'a str,
    pub num_pages: i32,
    pub source_type: &'a str,
    pub source_external_id: Option<&'a str>,
    pub metadata: &'a str,
    pub created_at: &'a str,
}

/// Page record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::pages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PageRecord {
    pub id: String,
    pub issue_id: String,
    pub page_number: i32,
    pub image_path: String,
    pub ocr_text: Option<String>,
    pub ocr_confidence: Option<f64>,
    pub ocr_provider: Option<String>,
    pub ocr_version: Option<String>,
    pub ocr_meta: Option<String>,
    pub ingestion_status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// New page for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::pages)]
pub struct NewPage<'a> {
    pub id: &'a str,
    pub issue_id: &'a str,
    pub page_number: i32,
    pub image_path: &'a str,
    pub ingestion_status: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// OCR columns of a page, always written together.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = schema::pages)]
pub struct PageOcrChangeset<'a> {
    pub ocr_text: &'a str,
    pub ocr_confidence: Option<f64>,
    pub ocr_provider: &'a str,
    pub ocr_version: Option<&'a str>,
    pub ocr_meta: Option<&'a str>,
    pub ingestion_status: &'a str,
    pub updated_at: &'a str,
}

/// Status change that drops any stored OCR output.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = schema::pages, treat_none_as_null = true)]
pub struct PageOcrClearChangeset<'a> {
    pub ocr_text: Option<&'a str>,
    pub ocr_confidence: Option<f64>,
    pub ocr_provider: Option<&'a str>,
    pub ocr_version: Option<&'a str>,
    pub ocr_meta: Option<&'a str>,
    pub ingestion_status: &'a str,
    pub updated_at: &'a str,
}

impl<'a> PageOcrClearChangeset<'a> {
    pub fn new(ingestion_status: &'a str, updated_at: &'a str) -> Self {
        Self {
            ocr_text: None,
            ocr_confidence: None,
            ocr_provider: None,
            ocr_version: None,
            ocr_meta: None,
            ingestion_status,
            updated_at,
        }
    }
}

/// Ingest job record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::ingest_jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct IngestJobRecord {
    pub id: String,
    pub idempotency_key: String,
    pub issue_id: Option<String>,
    pub status: String,
    pub progress: String,
    pub progress_version: i32,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// New ingest job for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::ingest_jobs)]
pub struct NewIngestJob<'a> {
    pub id: &'a str,
    pub idempotency_key: &'a str,
    pub issue_id: Option<&'a str>,
    pub status: &'a str,
    pub progress: &'a str,
    pub progress_version: i32,
    pub error_message: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Partial update of an ingest job. `None` fields are left untouched.
#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = schema::ingest_jobs)]
pub struct IngestJobChangeset<'a> {
    pub issue_id: Option<&'a str>,
    pub status: Option<&'a str>,
    pub progress: Option<&'a str>,
    pub error_message: Option<&'a str>,
    pub updated_at: Option<&'a str>,
}
