//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking.
//! Supports both SQLite and PostgreSQL backends.

/// Shared lookup/list/count/delete methods for a repository holding `pool: DbPool`.
///
/// The calling module must have `diesel::prelude::*`, `diesel_async::RunQueryDsl`,
/// `RepositoryError` and the repository `Result` alias in scope.
macro_rules! crud_methods {
    (
        table: $table:ident,
        record: $record:ty,
        model: $model:ty,
        order: $order:expr
    ) => {
        /// Get a record by ID.
        pub async fn get_by_id(&self, id: &str) -> Result<Option<$model>> {
            $crate::with_conn!(self.pool, conn, {
                let record = $table::table
                    .find(id)
                    .select(<$record>::as_select())
                    .first::<$record>(&mut conn)
                    .await
                    .optional()?;
                record
                    .map(<$model>::try_from)
                    .transpose()
                    .map_err(RepositoryError::from)
            })
        }

        /// List records in the repository's natural order.
        pub async fn list_all(&self, limit: i64, offset: i64) -> Result<Vec<$model>> {
            $crate::with_conn!(self.pool, conn, {
                let records = $table::table
                    .select(<$record>::as_select())
                    .order($order)
                    .limit(limit)
                    .offset(offset)
                    .load::<$record>(&mut conn)
                    .await?;
                records
                    .into_iter()
                    .map(|r| <$model>::try_from(r).map_err(RepositoryError::from))
                    .collect()
            })
        }

        /// Count all records.
        pub async fn count(&self) -> Result<u64> {
            $crate::with_conn!(self.pool, conn, {
                let count: i64 = $table::table.count().get_result(&mut conn).await?;
                Ok(count as u64)
            })
        }

        /// Delete a record. Returns whether a row was removed.
        pub async fn delete(&self, id: &str) -> Result<bool> {
            $crate::with_conn!(self.pool, conn, {
                let rows = diesel::delete($table::table.find(id))
                    .execute(&mut conn)
                    .await?;
                Ok(rows > 0)
            })
        }
    };
}

pub mod context;
pub mod error;
pub mod models;
pub mod pool;
pub mod util;

mod ingest_job;
mod issue;
mod newspaper;
mod page;

pub use context::DbContext;
pub use error::{RepositoryError, Result};
pub use ingest_job::{IngestJobRepository, JobUpdate};
pub use issue::IssueRepository;
pub use newspaper::NewspaperRepository;
pub use page::PageRepository;
pub use pool::{DbError, DbPool};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Format a timestamp for storage. Fixed width, so text ordering is time ordering.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Format a calendar date for storage (`YYYY-MM-DD`).
pub fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a stored calendar date.
pub fn parse_date(s: &str) -> std::result::Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
        DbError::DeserializationError(format!("Invalid date '{}': {}", s, e).into())
    })
}

/// Parse optional stored JSON, dropping values that fail to parse.
pub(crate) fn parse_json_opt(s: Option<String>) -> Option<serde_json::Value> {
    s.and_then(|s| serde_json::from_str(&s).ok())
}
