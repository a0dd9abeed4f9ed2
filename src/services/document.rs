//! PDF to page image conversion.
//!
//! Rasterization is delegated to a [`PageRasterizer`]; the default one shells
//! out to `pdftoppm` from poppler-utils. [`PdfDocumentProcessor`] validates the
//! input, runs the rasterizer and wraps every failure in a single
//! [`ProcessingError`]. Output is all-or-nothing.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;
use thiserror::Error;

/// Resolution used when none is configured.
pub const DEFAULT_DPI: u32 = 300;

/// Error returned by [`PdfDocumentProcessor::process`].
#[derive(Debug, Error)]
#[error("Failed to process PDF: {0}")]
pub struct ProcessingError(#[from] pub RasterError);

/// Underlying cause of a failed conversion.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("not a PDF document (detected {0})")]
    NotPdf(String),

    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("pdftoppm failed: {0}")]
    ToolFailed(String),

    #[error("no page images were produced")]
    NoPages,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Image encoding for rendered pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RasterFormat {
    #[default]
    Png,
    Jpeg,
    Tiff,
}

impl RasterFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Tiff => "tiff",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "tiff" | "tif" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// File extension pdftoppm writes for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Tiff => "tif",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Tiff => "image/tiff",
        }
    }

    fn pdftoppm_flag(&self) -> &'static str {
        match self {
            Self::Png => "-png",
            Self::Jpeg => "-jpeg",
            Self::Tiff => "-tiff",
        }
    }
}

impl std::fmt::Display for RasterFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders every page of a PDF to encoded image bytes, in page order.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(
        &self,
        pdf: &[u8],
        dpi: u32,
        format: RasterFormat,
    ) -> Result<Vec<Vec<u8>>, RasterError>;
}

/// Rasterizer backed by the `pdftoppm` binary.
#[derive(Debug, Clone, Default)]
pub struct PdftoppmRasterizer;

impl PdftoppmRasterizer {
    /// Whether `pdftoppm` is on PATH.
    pub fn is_available() -> bool {
        Command::new("which")
            .arg("pdftoppm")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn rasterize(
        &self,
        pdf: &[u8],
        dpi: u32,
        format: RasterFormat,
    ) -> Result<Vec<Vec<u8>>, RasterError> {
        let temp_dir = TempDir::new()?;
        let temp_path = temp_dir.path();
        let input = temp_path.join("input.pdf");
        std::fs::write(&input, pdf)?;

        let output = Command::new("pdftoppm")
            .arg(format.pdftoppm_flag())
            .args(["-r", &dpi.to_string()])
            .arg(&input)
            .arg(temp_path.join("page"))
            .output();

        match output {
            Ok(out) if out.status.success() => {}
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                return Err(RasterError::ToolFailed(stderr.trim().to_string()));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RasterError::ToolNotFound(
                    "pdftoppm (install poppler-utils)".to_string(),
                ));
            }
            Err(e) => return Err(RasterError::Io(e)),
        }

        let images = collect_page_images(temp_path, format.extension())?;
        images
            .iter()
            .map(|path| std::fs::read(path).map_err(RasterError::from))
            .collect()
    }
}

/// Find the rendered pages in `dir`, ordered by page number.
///
/// pdftoppm names files `page-1.png`, `page-01.png` or `page-001.png`
/// depending on the page count.
fn collect_page_images(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, RasterError> {
    let mut images: Vec<(u32, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|ext| ext == extension).unwrap_or(false))
        .filter_map(|p| page_index(&p).map(|n| (n, p)))
        .collect();

    images.sort_by_key(|(n, _)| *n);
    Ok(images.into_iter().map(|(_, p)| p).collect())
}

fn page_index(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    stem.rsplit('-').next()?.parse().ok()
}

/// Converts uploaded documents into page images.
pub trait DocumentProcessor: Send + Sync {
    /// One encoded image per page, in page order.
    fn process(&self, document: &[u8]) -> Result<Vec<Vec<u8>>, ProcessingError>;

    /// Encoding of the images returned by `process`.
    fn format(&self) -> RasterFormat;
}

/// PDF processor with a configurable resolution and image format.
#[derive(Clone)]
pub struct PdfDocumentProcessor {
    dpi: u32,
    format: RasterFormat,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl PdfDocumentProcessor {
    /// Create a processor that renders with `pdftoppm`.
    pub fn new(dpi: u32, format: RasterFormat) -> Self {
        Self::with_rasterizer(dpi, format, Arc::new(PdftoppmRasterizer))
    }

    pub fn with_rasterizer(
        dpi: u32,
        format: RasterFormat,
        rasterizer: Arc<dyn PageRasterizer>,
    ) -> Self {
        Self {
            dpi,
            format,
            rasterizer,
        }
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }
}

impl Default for PdfDocumentProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_DPI, RasterFormat::Png)
    }
}

impl DocumentProcessor for PdfDocumentProcessor {
    fn process(&self, document: &[u8]) -> Result<Vec<Vec<u8>>, ProcessingError> {
        let detected = infer::get(document)
            .map(|kind| kind.mime_type())
            .unwrap_or("unknown type");
        if detected != "application/pdf" {
            return Err(RasterError::NotPdf(detected.to_string()).into());
        }

        let pages = self.rasterizer.rasterize(document, self.dpi, self.format)?;
        if pages.is_empty() {
            return Err(RasterError::NoPages.into());
        }

        tracing::debug!(
            "Rendered {} page(s) at {} DPI as {}",
            pages.len(),
            self.dpi,
            self.format
        );
        Ok(pages)
    }

    fn format(&self) -> RasterFormat {
        self.format
    }
}
