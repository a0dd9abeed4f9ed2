//! Page model and per-page ingestion status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ingestion status of a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// Image stored, nothing else done.
    Pending,
    /// Waiting for OCR.
    OcrPending,
    /// OCR text stored.
    OcrCompleted,
    /// OCR attempted and failed.
    OcrFailed,
    /// Text has been indexed downstream.
    Indexed,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::OcrPending => "ocr_pending",
            Self::OcrCompleted => "ocr_completed",
            Self::OcrFailed => "ocr_failed",
            Self::Indexed => "indexed",
        }
    }

    /// Whether a page in this state carries OCR output.
    pub fn has_ocr(&self) -> bool {
        matches!(self, Self::OcrCompleted | Self::Indexed)
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "ocr_pending" => Some(Self::OcrPending),
            "ocr_completed" => Some(Self::OcrCompleted),
            "ocr_failed" => Some(Self::OcrFailed),
            "indexed" => Some(Self::Indexed),
            _ => None,
        }
    }
}

impl std::fmt::Display for PageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OCR output for one page. All fields are stored in a single write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrOutput {
    pub text: String,
    pub confidence: Option<f64>,
    pub provider: String,
    pub version: Option<String>,
    pub meta: Option<serde_json::Value>,
}

/// A single scanned page of an issue. `(issue_id, page_number)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub issue_id: String,
    /// 1-based position within the issue.
    pub page_number: i32,
    /// Image location relative to the page image store.
    pub image_path: String,
    pub ocr_text: Option<String>,
    pub ocr_confidence: Option<f64>,
    pub ocr_provider: Option<String>,
    pub ocr_version: Option<String>,
    pub ocr_meta: Option<serde_json::Value>,
    pub ingestion_status: PageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    pub fn new(issue_id: impl Into<String>, page_number: i32, image_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            issue_id: issue_id.into(),
            page_number,
            image_path: image_path.into(),
            ocr_text: None,
            ocr_confidence: None,
            ocr_provider: None,
            ocr_version: None,
            ocr_meta: None,
            ingestion_status: PageStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether OCR text has been stored for this page.
    pub fn has_text(&self) -> bool {
        self.ocr_text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}
