//! Diesel-based ingest job repository.
//!
//! Status writes are guarded in the UPDATE predicate so a job can only follow
//! its lifecycle, and progress increments use a version column as an
//! optimistic lock so concurrent writers never lose counts.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{IngestJobChangeset, IngestJobRecord, NewIngestJob};
use super::pool::DbPool;
use super::{format_datetime, parse_datetime, RepositoryError, Result};
use crate::models::{IngestJob, JobProgress, JobStatus};
use crate::schema::ingest_jobs;
use crate::with_conn;

/// Attempts before `increment_progress` gives up on a contended job.
const MAX_PROGRESS_ATTEMPTS: usize = 32;

/// Convert a database record to a domain model.
impl TryFrom<IngestJobRecord> for IngestJob {
    type Error = diesel::result::Error;

    fn try_from(record: IngestJobRecord) -> std::result::Result<Self, Self::Error> {
        Ok(IngestJob {
            status: JobStatus::from_str(&record.status).ok_or_else(|| {
                diesel::result::Error::DeserializationError(
                    format!("Invalid job status: '{}'", record.status).into(),
                )
            })?,
            progress: JobProgress::from_json(&record.progress),
            id: record.id,
            idempotency_key: record.idempotency_key,
            issue_id: record.issue_id,
            error_message: record.error_message,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        })
    }
}

/// Fields to change on a job. Unset fields are left as stored.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub issue_id: Option<String>,
    pub status: Option<JobStatus>,
    pub progress: Option<JobProgress>,
    pub error_message: Option<String>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_issue(mut self, issue_id: impl Into<String>) -> Self {
        self.issue_id = Some(issue_id.into());
        self
    }

    pub fn with_progress(mut self, progress: JobProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.issue_id.is_none()
            && self.status.is_none()
            && self.progress.is_none()
            && self.error_message.is_none()
    }
}

/// Diesel-based ingest job repository.
#[derive(Clone)]
pub struct IngestJobRepository {
    pool: DbPool,
}

impl IngestJobRepository {
    /// Create a new repository with an existing pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    crud_methods!(
        table: ingest_jobs,
        record: IngestJobRecord,
        model: IngestJob,
        order: (ingest_jobs::created_at.desc(), ingest_jobs::id.asc())
    );

    /// Get a job by its idempotency key.
    pub async fn get_by_key(&self, idempotency_key: &str) -> Result<Option<IngestJob>> {
        with_conn!(self.pool, conn, {
            let record = ingest_jobs::table
                .filter(ingest_jobs::idempotency_key.eq(idempotency_key))
                .select(IngestJobRecord::as_select())
                .first::<IngestJobRecord>(&mut conn)
                .await
                .optional()?;
            record
                .map(IngestJob::try_from)
                .transpose()
                .map_err(RepositoryError::from)
        })
    }

    /// Create a job for a new idempotency key.
    ///
    /// Fails with `Duplicate` if a job with this key already exists; callers
    /// wanting idempotent submission look the key up first.
    pub async fn create_with_key(
        &self,
        idempotency_key: &str,
        status: JobStatus,
    ) -> Result<IngestJob> {
        let mut job = IngestJob::new(idempotency_key);
        job.status = status;

        let progress = serde_json::to_string(&job.progress)?;
        let created_at = format_datetime(&job.created_at);
        let new = NewIngestJob {
            id: &job.id,
            idempotency_key,
            issue_id: None,
            status: status.as_str(),
            progress: &progress,
            progress_version: 0,
            error_message: None,
            created_at: &created_at,
            updated_at: &created_at,
        };

        let result = with_conn!(self.pool, conn, {
            diesel::insert_into(ingest_jobs::table)
                .values(&new)
                .execute(&mut conn)
                .await
        });

        match result {
            Ok(_) => self
                .get_by_id(&job.id)
                .await?
                .ok_or(RepositoryError::WriteFailed {
                    action: "create",
                    table: "ingest_jobs",
                }),
            Err(e) if super::util::is_unique_violation(&e) => Err(RepositoryError::Duplicate {
                entity: "ingest job",
                key: idempotency_key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply a partial update to a job and return the stored result.
    ///
    /// A status change is only written if the stored status may move to it;
    /// otherwise nothing is written and `InvalidTransition` is returned.
    pub async fn update_job(&self, job_id: &str, update: &JobUpdate) -> Result<IngestJob> {
        if update.is_empty() {
            return self.require(job_id).await;
        }

        let progress = update
            .progress
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let now = format_datetime(&Utc::now());
        let changes = IngestJobChangeset {
            issue_id: update.issue_id.as_deref(),
            status: update.status.map(|s| s.as_str()),
            progress: progress.as_deref(),
            error_message: update.error_message.as_deref(),
            updated_at: Some(&now),
        };
        let bump = ingest_jobs::progress_version.eq(ingest_jobs::progress_version + 1);

        let rows = match update.status {
            Some(next) => {
                let allowed: Vec<&str> = JobStatus::allowed_predecessors(next)
                    .iter()
                    .map(|s| s.as_str())
                    .collect();
                with_conn!(self.pool, conn, {
                    diesel::update(
                        ingest_jobs::table
                            .filter(ingest_jobs::id.eq(job_id))
                            .filter(ingest_jobs::status.eq_any(allowed)),
                    )
                    .set((&changes, bump))
                    .execute(&mut conn)
                    .await?
                })
            }
            None => with_conn!(self.pool, conn, {
                diesel::update(ingest_jobs::table.filter(ingest_jobs::id.eq(job_id)))
                    .set((&changes, bump))
                    .execute(&mut conn)
                    .await?
            }),
        };

        if rows == 0 {
            let current = self.require(job_id).await?;
            return match update.status {
                Some(next) => Err(RepositoryError::InvalidTransition {
                    from: current.status,
                    to: next,
                }),
                None => Err(RepositoryError::WriteFailed {
                    action: "update",
                    table: "ingest_jobs",
                }),
            };
        }

        self.require(job_id).await
    }

    /// Record the outcome of one page in the job's progress.
    ///
    /// `pages_processed`, `pages_total` and `stage` overwrite the stored values;
    /// `error` decides whether the success or failure count goes up. The merge
    /// is retried against the latest stored progress if another writer got in
    /// first.
    pub async fn increment_progress(
        &self,
        job_id: &str,
        pages_processed: u32,
        pages_total: u32,
        stage: &str,
        error: Option<&str>,
    ) -> Result<IngestJob> {
        for attempt in 1..=MAX_PROGRESS_ATTEMPTS {
            let record = self.require_record(job_id).await?;
            let version = record.progress_version;

            let mut progress = JobProgress::from_json(&record.progress);
            progress.record_page(pages_processed, pages_total, stage, error);
            let progress = serde_json::to_string(&progress)?;
            let now = format_datetime(&Utc::now());

            let rows = with_conn!(self.pool, conn, {
                diesel::update(
                    ingest_jobs::table
                        .filter(ingest_jobs::id.eq(job_id))
                        .filter(ingest_jobs::progress_version.eq(version)),
                )
                .set((
                    ingest_jobs::progress.eq(&progress),
                    ingest_jobs::progress_version.eq(version + 1),
                    ingest_jobs::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .await?
            });

            if rows > 0 {
                return self.require(job_id).await;
            }

            tracing::debug!(
                "Progress for job {} changed concurrently (attempt {}), retrying",
                job_id,
                attempt
            );
            tokio::task::yield_now().await;
        }

        Err(RepositoryError::Conflict {
            entity: "ingest job",
            id: job_id.to_string(),
        })
    }

    /// Jobs in a given status, newest first.
    pub async fn list_by_status(
        &self,
        status: JobStatus,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<IngestJob>> {
        with_conn!(self.pool, conn, {
            let records = ingest_jobs::table
                .filter(ingest_jobs::status.eq(status.as_str()))
                .select(IngestJobRecord::as_select())
                .order((ingest_jobs::created_at.desc(), ingest_jobs::id.asc()))
                .limit(limit)
                .offset(offset)
                .load::<IngestJobRecord>(&mut conn)
                .await?;
            records
                .into_iter()
                .map(|r| IngestJob::try_from(r).map_err(RepositoryError::from))
                .collect()
        })
    }

    /// Most recently created jobs.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<IngestJob>> {
        self.list_all(limit, 0).await
    }

    async fn require(&self, job_id: &str) -> Result<IngestJob> {
        self.get_by_id(job_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "ingest job",
                id: job_id.to_string(),
            })
    }

    async fn require_record(&self, job_id: &str) -> Result<IngestJobRecord> {
        with_conn!(self.pool, conn, {
            ingest_jobs::table
                .find(job_id)
                .select(IngestJobRecord::as_select())
                .first::<IngestJobRecord>(&mut conn)
                .await
                .optional()?
                .ok_or_else(|| RepositoryError::NotFound {
                    entity: "ingest job",
                    id: job_id.to_string(),
                })
        })
    }
}
