//! Issue model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::DEFAULT_SOURCE_TYPE;

/// A dated issue of a newspaper. `(newspaper_id, issue_date)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub newspaper_id: String,
    pub issue_date: NaiveDate,
    pub num_pages: i32,
    pub source_type: String,
    pub source_external_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Issue {
    /// Create an issue for an upload with no pages yet.
    pub fn new(newspaper_id: impl Into<String>, issue_date: NaiveDate) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            newspaper_id: newspaper_id.into(),
            issue_date,
            num_pages: 0,
            source_type: DEFAULT_SOURCE_TYPE.to_string(),
            source_external_id: None,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }
}
