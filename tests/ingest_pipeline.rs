//! End-to-end ingestion tests.
//!
//! Rendering and OCR are replaced with in-process fakes so the tests do not
//! need poppler or a network OCR service.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use image::{GrayImage, ImageFormat, Luma};
use tempfile::TempDir;
use tokio::sync::mpsc;

use timebrowser::models::{JobStatus, OcrOutput, PageStatus};
use timebrowser::repository::DbContext;
use timebrowser::services::{
    IngestEvent, IngestRequest, IngestService, OcrBackend, OcrError, PageRasterizer,
    PdfDocumentProcessor, RasterError, RasterFormat, StubOcrBackend,
};
use timebrowser::storage::PageImageStore;

const PDF_BYTES: &[u8] = b"%PDF-1.4\n%fake\ntrailer\n<<>>\n%%EOF\n";

struct FakeRasterizer {
    pages: usize,
}

impl PageRasterizer for FakeRasterizer {
    fn rasterize(
        &self,
        _pdf: &[u8],
        _dpi: u32,
        _format: RasterFormat,
    ) -> Result<Vec<Vec<u8>>, RasterError> {
        (0..self.pages)
            .map(|i| {
                let img = GrayImage::from_pixel(40, 60, Luma([i as u8]));
                let mut buf = Cursor::new(Vec::new());
                img.write_to(&mut buf, ImageFormat::Png)
                    .map_err(|e| RasterError::ToolFailed(e.to_string()))?;
                Ok(buf.into_inner())
            })
            .collect()
    }
}

struct BrokenRasterizer;

impl PageRasterizer for BrokenRasterizer {
    fn rasterize(
        &self,
        _pdf: &[u8],
        _dpi: u32,
        _format: RasterFormat,
    ) -> Result<Vec<Vec<u8>>, RasterError> {
        Err(RasterError::ToolFailed("May not be a PDF file".to_string()))
    }
}

/// Fails the calls whose 1-based number is in `fail_on`.
struct FlakyOcr {
    calls: AtomicUsize,
    fail_on: Vec<usize>,
}

impl FlakyOcr {
    fn failing(fail_on: Vec<usize>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on,
        }
    }
}

#[async_trait]
impl OcrBackend for FlakyOcr {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn recognize(&self, _image: &[u8], _format: RasterFormat) -> Result<OcrOutput, OcrError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on.contains(&call) {
            return Err(OcrError::OcrFailed(format!("call {} refused", call)));
        }
        Ok(OcrOutput {
            text: format!("page text {}", call),
            confidence: Some(0.8),
            provider: self.name().to_string(),
            version: Some("1".to_string()),
            meta: None,
        })
    }
}

struct Fixture {
    ctx: DbContext,
    images: PageImageStore,
    _dir: TempDir,
}

async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let ctx = DbContext::new(&dir.path().join("test.db"));
    ctx.init_schema().await.unwrap();
    let images = PageImageStore::new(dir.path().join("pages"));
    Fixture {
        ctx,
        images,
        _dir: dir,
    }
}

fn service(f: &Fixture, rasterizer: Arc<dyn PageRasterizer>) -> IngestService {
    let processor = PdfDocumentProcessor::with_rasterizer(300, RasterFormat::Png, rasterizer);
    IngestService::new(f.ctx.clone(), Arc::new(processor), f.images.clone())
}

fn request(key: &str) -> IngestRequest {
    IngestRequest {
        idempotency_key: key.to_string(),
        newspaper: "The Daily Courier".to_string(),
        issue_date: NaiveDate::from_ymd_opt(1912, 4, 15).unwrap(),
        document: PDF_BYTES.to_vec(),
        source_external_id: None,
    }
}

#[tokio::test]
async fn ingest_creates_issue_pages_and_completes_job() {
    let f = fixture().await;
    let svc = service(&f, Arc::new(FakeRasterizer { pages: 3 })).with_ocr(Arc::new(StubOcrBackend));

    let outcome = svc.ingest(request("upload-1"), None).await.unwrap();
    assert!(!outcome.duplicate);

    let job = outcome.job;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress.pages_total, 3);
    assert_eq!(job.progress.pages_processed, 3);
    assert_eq!(job.progress.pages_succeeded, 3);
    assert_eq!(job.progress.pages_failed, 0);
    assert!(job.progress.errors.is_empty());

    let issue_id = job.issue_id.clone().unwrap();
    let issue = f.ctx.issues().get_by_id(&issue_id).await.unwrap().unwrap();
    assert_eq!(issue.num_pages, 3);
    assert_eq!(issue.issue_date, NaiveDate::from_ymd_opt(1912, 4, 15).unwrap());

    let newspaper = f.ctx.newspapers().get_by_id(&issue.newspaper_id).await.unwrap().unwrap();
    assert_eq!(newspaper.name, "The Daily Courier");

    let pages = f.ctx.pages().list_by_issue(&issue_id).await.unwrap();
    assert_eq!(pages.len(), 3);
    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.page_number, i as i32 + 1);
        assert_eq!(page.ingestion_status, PageStatus::OcrCompleted);
        assert_eq!(page.ocr_provider.as_deref(), Some("stub"));
        assert_eq!(
            page.image_path,
            format!("{}/page-{:04}.png", issue_id, i + 1)
        );

        let stored = std::fs::read(f.images.resolve(&page.image_path)).unwrap();
        let img = image::load_from_memory_with_format(&stored, ImageFormat::Png).unwrap();
        assert_eq!((img.width(), img.height()), (40, 60));
    }
}

#[tokio::test]
async fn duplicate_key_returns_existing_job() {
    let f = fixture().await;
    let svc = service(&f, Arc::new(FakeRasterizer { pages: 2 }));

    let first = svc.ingest(request("upload-1"), None).await.unwrap();
    let second = svc.ingest(request("upload-1"), None).await.unwrap();

    assert!(second.duplicate);
    assert_eq!(first.job.id, second.job.id);
    assert_eq!(second.job.status, JobStatus::Completed);
    assert_eq!(f.ctx.ingest_jobs().count().await.unwrap(), 1);
    assert_eq!(f.ctx.issues().count().await.unwrap(), 1);
}

#[tokio::test]
async fn new_key_for_same_issue_reuses_issue_and_pages() {
    let f = fixture().await;
    let svc = service(&f, Arc::new(FakeRasterizer { pages: 2 }));

    let first = svc.ingest(request("upload-1"), None).await.unwrap();
    let second = svc.ingest(request("upload-2"), None).await.unwrap();

    assert!(!second.duplicate);
    assert_ne!(first.job.id, second.job.id);
    assert_eq!(first.job.issue_id, second.job.issue_id);
    assert_eq!(f.ctx.issues().count().await.unwrap(), 1);
    assert_eq!(f.ctx.pages().count().await.unwrap(), 2);
}

#[tokio::test]
async fn reingesting_shorter_scan_replaces_pages() {
    let f = fixture().await;
    let first = service(&f, Arc::new(FakeRasterizer { pages: 3 }))
        .with_ocr(Arc::new(StubOcrBackend))
        .ingest(request("upload-1"), None)
        .await
        .unwrap()
        .job;
    let issue_id = first.issue_id.clone().unwrap();
    let old_pages = f.ctx.pages().list_by_issue(&issue_id).await.unwrap();
    assert_eq!(old_pages.len(), 3);

    let second = service(&f, Arc::new(FakeRasterizer { pages: 1 }))
        .with_ocr(Arc::new(FlakyOcr::failing(vec![1])))
        .ingest(request("upload-2"), None)
        .await
        .unwrap()
        .job;
    assert_eq!(second.issue_id.as_deref(), Some(issue_id.as_str()));
    assert_eq!(second.status, JobStatus::Failed);

    let issue = f.ctx.issues().get_by_id(&issue_id).await.unwrap().unwrap();
    assert_eq!(issue.num_pages, 1);

    let pages = f.ctx.pages().list_by_issue(&issue_id).await.unwrap();
    assert_eq!(pages.len(), 1);
    let page = &pages[0];
    assert_eq!(page.id, old_pages[0].id);
    assert_eq!(page.ingestion_status, PageStatus::OcrFailed);
    assert!(page.ocr_text.is_none());
    assert!(page.ocr_provider.is_none());
    assert!(page.ocr_confidence.is_none());

    assert!(f.images.resolve(&old_pages[0].image_path).exists());
    for stale in &old_pages[1..] {
        assert!(!f.images.resolve(&stale.image_path).exists());
    }
}

#[tokio::test]
async fn reingesting_without_ocr_resets_pages_to_pending() {
    let f = fixture().await;
    service(&f, Arc::new(FakeRasterizer { pages: 2 }))
        .with_ocr(Arc::new(StubOcrBackend))
        .ingest(request("upload-1"), None)
        .await
        .unwrap();

    let job = service(&f, Arc::new(FakeRasterizer { pages: 2 }))
        .ingest(request("upload-2"), None)
        .await
        .unwrap()
        .job;
    assert_eq!(job.status, JobStatus::Completed);

    let pages = f
        .ctx
        .pages()
        .list_by_issue(job.issue_id.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(pages.len(), 2);
    for page in &pages {
        assert_eq!(page.ingestion_status, PageStatus::OcrPending);
        assert!(page.ocr_text.is_none());
    }
}

#[tokio::test]
async fn page_ocr_failure_is_recorded_and_job_completes() {
    let f = fixture().await;
    let svc = service(&f, Arc::new(FakeRasterizer { pages: 3 }))
        .with_ocr(Arc::new(FlakyOcr::failing(vec![2])));

    let job = svc.ingest(request("upload-1"), None).await.unwrap().job;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress.pages_succeeded, 2);
    assert_eq!(job.progress.pages_failed, 1);
    assert_eq!(job.progress.errors.len(), 1);
    assert!(job.progress.errors[0].contains("Page 2"));

    let pages = f
        .ctx
        .pages()
        .list_by_issue(job.issue_id.as_deref().unwrap())
        .await
        .unwrap();
    let statuses: Vec<_> = pages.iter().map(|p| p.ingestion_status).collect();
    assert_eq!(
        statuses,
        vec![
            PageStatus::OcrCompleted,
            PageStatus::OcrFailed,
            PageStatus::OcrCompleted
        ]
    );
    assert_eq!(pages[2].ocr_text.as_deref(), Some("page text 3"));
}

#[tokio::test]
async fn all_pages_failing_fails_the_job() {
    let f = fixture().await;
    let svc = service(&f, Arc::new(FakeRasterizer { pages: 2 }))
        .with_ocr(Arc::new(FlakyOcr::failing(vec![1, 2])));

    let job = svc.ingest(request("upload-1"), None).await.unwrap().job;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some("All 2 pages failed"));
    assert_eq!(job.progress.pages_failed, 2);
}

#[tokio::test]
async fn error_list_keeps_the_last_ten() {
    let f = fixture().await;
    let svc = service(&f, Arc::new(FakeRasterizer { pages: 12 }))
        .with_ocr(Arc::new(FlakyOcr::failing((1..=11).collect())));

    let job = svc.ingest(request("upload-1"), None).await.unwrap().job;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress.pages_failed, 11);
    assert_eq!(job.progress.pages_succeeded, 1);
    assert_eq!(job.progress.errors.len(), 10);
    assert!(job.progress.errors[0].starts_with("Page 2:"));
    assert!(job.progress.errors[9].starts_with("Page 11:"));
}

#[tokio::test]
async fn processing_failure_fails_job_without_issue() {
    let f = fixture().await;
    let svc = service(&f, Arc::new(BrokenRasterizer));

    let job = svc.ingest(request("upload-1"), None).await.unwrap().job;

    assert_eq!(job.status, JobStatus::Failed);
    let message = job.error_message.unwrap();
    assert!(message.starts_with("Failed to process PDF"));
    assert!(message.contains("May not be a PDF file"));
    assert!(job.issue_id.is_none());
    assert_eq!(f.ctx.issues().count().await.unwrap(), 0);
    assert_eq!(f.ctx.pages().count().await.unwrap(), 0);
}

#[tokio::test]
async fn without_ocr_pages_wait_for_ocr() {
    let f = fixture().await;
    let svc = service(&f, Arc::new(FakeRasterizer { pages: 1 }));

    let job = svc.ingest(request("upload-1"), None).await.unwrap().job;
    assert_eq!(job.status, JobStatus::Completed);

    let waiting = f
        .ctx
        .pages()
        .list_by_status(PageStatus::OcrPending, 10)
        .await
        .unwrap();
    assert_eq!(waiting.len(), 1);
    assert!(waiting[0].ocr_text.is_none());
}

#[tokio::test]
async fn events_follow_the_pipeline() {
    let f = fixture().await;
    let svc = service(&f, Arc::new(FakeRasterizer { pages: 2 }))
        .with_ocr(Arc::new(FlakyOcr::failing(vec![1])));

    let (tx, mut rx) = mpsc::channel(32);
    svc.ingest(request("upload-1"), Some(tx)).await.unwrap();

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(matches!(events[0], IngestEvent::JobCreated { .. }));
    assert!(matches!(events[1], IngestEvent::Rendered { pages: 2, .. }));
    assert!(matches!(events[2], IngestEvent::PageFailed { page_number: 1, .. }));
    assert!(matches!(events[3], IngestEvent::PageCompleted { page_number: 2 }));
    assert!(matches!(
        events[4],
        IngestEvent::Finished {
            status: JobStatus::Completed,
            ..
        }
    ));
    assert_eq!(events.len(), 5);
}
