//! Data models for the newspaper archive.

mod ingest_job;
mod issue;
mod newspaper;
mod page;

pub use ingest_job::{IngestJob, JobProgress, JobStatus, MAX_PROGRESS_ERRORS};
pub use issue::Issue;
pub use newspaper::Newspaper;
pub use page::{OcrOutput, Page, PageStatus};

/// Source type recorded for records created from uploaded files.
pub const DEFAULT_SOURCE_TYPE: &str = "upload";
