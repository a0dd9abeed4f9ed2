//! Document ingestion pipeline.
//!
//! Turns one uploaded PDF into a newspaper issue with OCR'd pages, tracked by
//! an ingest job keyed on a client-supplied idempotency key. Emits events for
//! progress display; callers that don't care pass `None`.

use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::mpsc;

use super::document::{DocumentProcessor, PdfDocumentProcessor, ProcessingError};
use super::ocr::{HttpOcrBackend, OcrBackend, OcrError, StubOcrBackend};
use crate::config::Settings;
use crate::models::{IngestJob, Issue, JobProgress, JobStatus, PageStatus};
use crate::repository::{DbContext, JobUpdate, RepositoryError};
use crate::storage::PageImageStore;

/// Errors that stop an ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error("Rendering task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// One document to ingest.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub idempotency_key: String,
    pub newspaper: String,
    pub issue_date: NaiveDate,
    pub document: Vec<u8>,
    pub source_external_id: Option<String>,
}

/// Events emitted during ingestion.
#[derive(Debug, Clone)]
pub enum IngestEvent {
    /// A job already existed for the key; nothing was done.
    Duplicate { job_id: String, status: JobStatus },
    /// A new job was created.
    JobCreated { job_id: String },
    /// The document was rendered.
    Rendered { issue_id: String, pages: usize },
    PageCompleted { page_number: i32 },
    PageFailed { page_number: i32, error: String },
    /// The job reached a terminal status.
    Finished { job_id: String, status: JobStatus },
}

/// Result of an ingestion call.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub job: IngestJob,
    /// True when the key had been seen before and the stored job was returned.
    pub duplicate: bool,
}

/// Service running the ingestion pipeline.
pub struct IngestService {
    db: DbContext,
    processor: Arc<dyn DocumentProcessor>,
    ocr: Option<Arc<dyn OcrBackend>>,
    images: PageImageStore,
}

impl IngestService {
    pub fn new(
        db: DbContext,
        processor: Arc<dyn DocumentProcessor>,
        images: PageImageStore,
    ) -> Self {
        Self {
            db,
            processor,
            ocr: None,
            images,
        }
    }

    /// Set the OCR backend. Without one, pages are left `ocr_pending`.
    pub fn with_ocr(mut self, backend: Arc<dyn OcrBackend>) -> Self {
        self.ocr = Some(backend);
        self
    }

    /// Build the service the way the application is configured.
    pub fn from_settings(settings: &Settings, db: DbContext) -> Result<Self, IngestError> {
        let processor = PdfDocumentProcessor::new(settings.pdf_dpi, settings.page_image_format);
        let service = Self::new(db, Arc::new(processor), PageImageStore::new(settings.images_dir()));

        if !settings.ocr_api_url.is_empty() {
            let backend =
                HttpOcrBackend::new(settings.ocr_api_url.clone(), settings.ocr_api_token.clone())?;
            Ok(service.with_ocr(Arc::new(backend)))
        } else if settings.use_stub_ocr() {
            Ok(service.with_ocr(Arc::new(StubOcrBackend)))
        } else {
            tracing::warn!("No OCR endpoint configured; pages will stay ocr_pending");
            Ok(service)
        }
    }

    /// Ingest a document.
    ///
    /// A key that was already submitted returns the stored job unchanged.
    /// Failures after the job exists are recorded on the job, which is then
    /// returned with status `failed`.
    pub async fn ingest(
        &self,
        request: IngestRequest,
        events: Option<mpsc::Sender<IngestEvent>>,
    ) -> Result<IngestOutcome, IngestError> {
        let jobs = self.db.ingest_jobs();

        if let Some(existing) = jobs.get_by_key(&request.idempotency_key).await? {
            return Ok(self.duplicate(existing, &events).await);
        }

        let job = match jobs
            .create_with_key(&request.idempotency_key, JobStatus::Pending)
            .await
        {
            Ok(job) => job,
            Err(RepositoryError::Duplicate { .. }) => {
                // Another submission with the same key won the insert
                let winner = jobs.get_by_key(&request.idempotency_key).await?.ok_or(
                    RepositoryError::WriteFailed {
                        action: "create",
                        table: "ingest_jobs",
                    },
                )?;
                return Ok(self.duplicate(winner, &events).await);
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            "Created ingest job {} for key {}",
            job.id,
            request.idempotency_key
        );
        emit(&events, IngestEvent::JobCreated { job_id: job.id.clone() }).await;

        match self.run(&job, request, &events).await {
            Ok(finished) => {
                emit(
                    &events,
                    IngestEvent::Finished {
                        job_id: finished.id.clone(),
                        status: finished.status,
                    },
                )
                .await;
                Ok(IngestOutcome {
                    job: finished,
                    duplicate: false,
                })
            }
            Err(e) => {
                tracing::error!("Ingest job {} failed: {}", job.id, e);
                let failed = jobs
                    .update_job(
                        &job.id,
                        &JobUpdate::status(JobStatus::Failed).with_error(e.to_string()),
                    )
                    .await?;
                emit(
                    &events,
                    IngestEvent::Finished {
                        job_id: failed.id.clone(),
                        status: failed.status,
                    },
                )
                .await;
                Ok(IngestOutcome {
                    job: failed,
                    duplicate: false,
                })
            }
        }
    }

    async fn duplicate(
        &self,
        job: IngestJob,
        events: &Option<mpsc::Sender<IngestEvent>>,
    ) -> IngestOutcome {
        tracing::info!(
            "Duplicate submission for key {}, returning job {} ({})",
            job.idempotency_key,
            job.id,
            job.status
        );
        emit(
            events,
            IngestEvent::Duplicate {
                job_id: job.id.clone(),
                status: job.status,
            },
        )
        .await;
        IngestOutcome {
            job,
            duplicate: true,
        }
    }

    async fn run(
        &self,
        job: &IngestJob,
        request: IngestRequest,
        events: &Option<mpsc::Sender<IngestEvent>>,
    ) -> Result<IngestJob, IngestError> {
        let jobs = self.db.ingest_jobs();
        let pages = self.db.pages();

        let newspaper = self.db.newspapers().get_or_create(&request.newspaper).await?;

        let processor = self.processor.clone();
        let document = request.document;
        let images = tokio::task::spawn_blocking(move || processor.process(&document)).await??;
        let format = self.processor.format();
        let total = images.len() as u32;

        let mut draft = Issue::new(&newspaper.id, request.issue_date);
        draft.num_pages = images.len() as i32;
        draft.source_external_id = request.source_external_id;
        let mut issue = self.db.issues().create_or_get(&draft).await?;
        if issue.num_pages != draft.num_pages {
            // Same issue uploaded again under a new key: the new scan wins
            tracing::info!(
                "Re-ingesting issue {}: {} page(s) replace {}",
                issue.id,
                draft.num_pages,
                issue.num_pages
            );
            issue = self
                .db
                .issues()
                .set_num_pages(&issue.id, draft.num_pages)
                .await?;
        }
        for stale in pages.delete_beyond(&issue.id, draft.num_pages).await? {
            if let Err(e) = self.images.remove(&stale.image_path).await {
                tracing::warn!("Failed to remove {}: {}", stale.image_path, e);
            }
        }

        let mut progress = JobProgress::new(total);
        progress.current_stage = "processing_pages".to_string();
        jobs.update_job(
            &job.id,
            &JobUpdate::status(JobStatus::Processing)
                .with_issue(&issue.id)
                .with_progress(progress),
        )
        .await?;

        tracing::info!(
            "Ingesting {} page(s) of {} {} as issue {}",
            total,
            newspaper.name,
            issue.issue_date,
            issue.id
        );
        emit(
            events,
            IngestEvent::Rendered {
                issue_id: issue.id.clone(),
                pages: images.len(),
            },
        )
        .await;

        let mut succeeded = 0u32;
        for (index, image) in images.iter().enumerate() {
            let page_number = index as i32 + 1;

            let error = match self
                .images
                .save(&issue.id, page_number, format.extension(), image)
                .await
            {
                Ok(path) => {
                    let mut page = pages
                        .create_or_get(&issue.id, page_number, &path, PageStatus::OcrPending)
                        .await?;
                    if page.image_path != path
                        || page.ingestion_status != PageStatus::OcrPending
                        || page.ocr_text.is_some()
                    {
                        page = pages.replace_image(&page.id, &path).await?;
                    }
                    match self.ocr {
                        Some(ref backend) => match backend.recognize(image, format).await {
                            Ok(output) => {
                                pages
                                    .update_ocr(&page.id, &output, PageStatus::OcrCompleted)
                                    .await?;
                                None
                            }
                            Err(e) => {
                                pages.update_status(&page.id, PageStatus::OcrFailed).await?;
                                Some(format!("Page {}: {}", page_number, e))
                            }
                        },
                        None => None,
                    }
                }
                Err(e) => Some(format!("Page {}: failed to store image: {}", page_number, e)),
            };

            match error {
                Some(ref message) => {
                    tracing::warn!("{}", message);
                    emit(
                        events,
                        IngestEvent::PageFailed {
                            page_number,
                            error: message.clone(),
                        },
                    )
                    .await;
                }
                None => {
                    succeeded += 1;
                    emit(events, IngestEvent::PageCompleted { page_number }).await;
                }
            }

            jobs.increment_progress(
                &job.id,
                index as u32 + 1,
                total,
                "processing_pages",
                error.as_deref(),
            )
            .await?;
        }

        let update = match final_status(succeeded, total) {
            JobStatus::Failed => JobUpdate::status(JobStatus::Failed)
                .with_error(format!("All {} pages failed", total)),
            status => JobUpdate::status(status),
        };
        let finished = jobs.update_job(&job.id, &update).await?;

        tracing::info!(
            "Ingest job {} {}: {}/{} pages succeeded",
            finished.id,
            finished.status,
            succeeded,
            total
        );
        Ok(finished)
    }
}

/// Terminal status for a job: failed only when no page made it.
fn final_status(succeeded: u32, total: u32) -> JobStatus {
    if total > 0 && succeeded == 0 {
        JobStatus::Failed
    } else {
        JobStatus::Completed
    }
}

async fn emit(events: &Option<mpsc::Sender<IngestEvent>>, event: IngestEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}
