//! Newspaper model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DEFAULT_SOURCE_TYPE;

/// A newspaper title. `name` is its natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Newspaper {
    pub id: String,
    pub name: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub description: Option<String>,
    pub source_type: String,
    pub created_at: DateTime<Utc>,
}

impl Newspaper {
    /// Create a newspaper with only a name set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            city: None,
            country: None,
            start_year: None,
            end_year: None,
            description: None,
            source_type: DEFAULT_SOURCE_TYPE.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Years of publication as a display string, e.g. "1851–1932" or "1851–".
    pub fn years_active(&self) -> Option<String> {
        match (self.start_year, self.end_year) {
            (Some(start), Some(end)) => Some(format!("{}–{}", start, end)),
            (Some(start), None) => Some(format!("{}–", start)),
            (None, Some(end)) => Some(format!("–{}", end)),
            (None, None) => None,
        }
    }
}
