//! Ingest job model: one job per ingestion attempt, keyed by an idempotency token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of per-page error messages kept in a job's progress.
pub const MAX_PROGRESS_ERRORS: usize = 10;

/// Lifecycle state of an ingest job.
///
/// `pending → processing → {completed, failed}`. A pending job may also fail
/// directly (e.g. the upload could not be rasterized).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a job in this state may be moved to `next`.
    ///
    /// Re-writing the current state is allowed while the job is still open.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (current, next) if *current == next => !current.is_terminal(),
            (Self::Pending, Self::Processing | Self::Failed) => true,
            (Self::Processing, Self::Completed | Self::Failed) => true,
            _ => false,
        }
    }

    /// All states from which a job may move to `next`.
    pub fn allowed_predecessors(next: JobStatus) -> Vec<JobStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress counters stored alongside a job as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobProgress {
    pub pages_total: u32,
    pub pages_processed: u32,
    pub pages_succeeded: u32,
    pub pages_failed: u32,
    pub current_stage: String,
    /// Most recent per-page errors, oldest first.
    pub errors: Vec<String>,
}

impl Default for JobProgress {
    fn default() -> Self {
        Self::new(0)
    }
}

impl JobProgress {
    /// Fresh progress for a job that will process `pages_total` pages.
    pub fn new(pages_total: u32) -> Self {
        Self {
            pages_total,
            pages_processed: 0,
            pages_succeeded: 0,
            pages_failed: 0,
            current_stage: "initializing".to_string(),
            errors: Vec::new(),
        }
    }

    /// Fold the outcome of one page into the counters.
    ///
    /// `pages_processed`, `pages_total` and `stage` replace the stored values.
    /// The success or failure count goes up by one depending on `error`.
    pub fn record_page(
        &mut self,
        pages_processed: u32,
        pages_total: u32,
        stage: &str,
        error: Option<&str>,
    ) {
        self.pages_processed = pages_processed;
        self.pages_total = pages_total;
        self.current_stage = stage.to_string();

        match error {
            Some(message) => {
                self.pages_failed += 1;
                self.errors.push(message.to_string());
                if self.errors.len() > MAX_PROGRESS_ERRORS {
                    let excess = self.errors.len() - MAX_PROGRESS_ERRORS;
                    self.errors.drain(..excess);
                }
            }
            None => self.pages_succeeded += 1,
        }
    }

    /// Parse stored progress JSON. Empty or malformed input yields fresh progress.
    pub fn from_json(s: &str) -> Self {
        serde_json::from_str(s).unwrap_or_default()
    }
}

/// An ingestion attempt for one uploaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestJob {
    pub id: String,
    pub idempotency_key: String,
    pub issue_id: Option<String>,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IngestJob {
    pub fn new(idempotency_key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            idempotency_key: idempotency_key.into(),
            issue_id: None,
            status: JobStatus::Pending,
            progress: JobProgress::default(),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use JobStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Processing));

        // Skipping a step
        assert!(!Pending.can_transition_to(Completed));
        // Going backwards
        assert!(!Processing.can_transition_to(Pending));
        // Terminal states are final
        for next in JobStatus::ALL {
            assert!(!Completed.can_transition_to(next));
            assert!(!Failed.can_transition_to(next));
        }
    }

    #[test]
    fn test_allowed_predecessors() {
        use JobStatus::*;

        assert_eq!(JobStatus::allowed_predecessors(Completed), vec![Processing]);
        assert_eq!(
            JobStatus::allowed_predecessors(Failed),
            vec![Pending, Processing]
        );
        assert_eq!(JobStatus::allowed_predecessors(Pending), vec![Pending]);
    }

    #[test]
    fn test_record_page_success_then_failure() {
        let mut progress = JobProgress::new(3);

        progress.record_page(1, 3, "ocr", None);
        progress.record_page(2, 5, "ocr", Some("page 2 unreadable"));

        assert_eq!(progress.pages_succeeded, 1);
        assert_eq!(progress.pages_failed, 1);
        assert_eq!(progress.pages_processed, 2);
        assert_eq!(progress.pages_total, 5);
        assert_eq!(progress.current_stage, "ocr");
        assert_eq!(progress.errors, vec!["page 2 unreadable".to_string()]);
    }

    #[test]
    fn test_error_list_keeps_most_recent() {
        let mut progress = JobProgress::new(15);

        for i in 1..=15 {
            progress.record_page(i, 15, "ocr", Some(&format!("error {}", i)));
        }

        assert_eq!(progress.pages_failed, 15);
        assert_eq!(progress.errors.len(), MAX_PROGRESS_ERRORS);
        assert_eq!(progress.errors.first().map(String::as_str), Some("error 6"));
        assert_eq!(progress.errors.last().map(String::as_str), Some("error 15"));
    }

    #[test]
    fn test_progress_from_json_is_lenient() {
        assert_eq!(JobProgress::from_json(""), JobProgress::default());
        assert_eq!(JobProgress::from_json("{}"), JobProgress::default());

        let partial = JobProgress::from_json(r#"{"pages_total": 4, "pages_failed": 1}"#);
        assert_eq!(partial.pages_total, 4);
        assert_eq!(partial.pages_failed, 1);
        assert_eq!(partial.current_stage, "initializing");
    }

    #[test]
    fn test_progress_json_shape() {
        let json = serde_json::to_value(JobProgress::new(2)).unwrap();
        assert_eq!(json["pages_total"], 2);
        assert_eq!(json["pages_processed"], 0);
        assert_eq!(json["pages_succeeded"], 0);
        assert_eq!(json["pages_failed"], 0);
        assert_eq!(json["current_stage"], "initializing");
        assert!(json["errors"].as_array().unwrap().is_empty());
    }
}
