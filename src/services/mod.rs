//! Service layer.
//!
//! Services hold the pipeline logic and are shared between the CLI and the
//! server. They report progress through events rather than printing.

pub mod document;
pub mod ingest;
pub mod ocr;

pub use document::{
    DocumentProcessor, PageRasterizer, PdfDocumentProcessor, PdftoppmRasterizer, ProcessingError,
    RasterError, RasterFormat,
};
pub use ingest::{IngestError, IngestEvent, IngestOutcome, IngestRequest, IngestService};
pub use ocr::{HttpOcrBackend, OcrBackend, OcrError, StubOcrBackend};
