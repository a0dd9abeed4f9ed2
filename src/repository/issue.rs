//! Diesel-based issue repository.

use chrono::NaiveDate;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{IssueRecord, NewIssue};
use super::pool::DbPool;
use super::{format_date, format_datetime, parse_date, parse_datetime, RepositoryError, Result};
use crate::models::Issue;
use crate::schema::issues;
use crate::with_conn;

/// Convert a database record to a domain model.
impl TryFrom<IssueRecord> for Issue {
    type Error = diesel::result::Error;

    fn try_from(record: IssueRecord) -> std::result::Result<Self, Self::Error> {
        Ok(Issue {
            issue_date: parse_date(&record.issue_date)?,
            id: record.id,
            newspaper_id: record.newspaper_id,
            num_pages: record.num_pages,
            source_type: record.source_type,
            source_external_id: record.source_external_id,
            metadata: serde_json::from_str(&record.metadata).unwrap_or_default(),
            created_at: parse_datetime(&record.created_at),
        })
    }
}

/// Diesel-based issue repository.
#[derive(Clone)]
pub struct IssueRepository {
    pool: DbPool,
}

impl IssueRepository {
    /// Create a new repository with an existing pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    crud_methods!(
        table: issues,
        record: IssueRecord,
        model: Issue,
        order: (issues::issue_date.desc(), issues::id.asc())
    );

    /// Get the issue of a newspaper published on a given date.
    pub async fn get_by_newspaper_and_date(
        &self,
        newspaper_id: &str,
        issue_date: NaiveDate,
    ) -> Result<Option<Issue>> {
        let date = format_date(&issue_date);

        with_conn!(self.pool, conn, {
            let record = issues::table
                .filter(issues::newspaper_id.eq(newspaper_id))
                .filter(issues::issue_date.eq(&date))
                .select(IssueRecord::as_select())
                .first::<IssueRecord>(&mut conn)
                .await
                .optional()?;
            record
                .map(Issue::try_from)
                .transpose()
                .map_err(RepositoryError::from)
        })
    }

    /// Return the issue for `(issue.newspaper_id, issue.issue_date)`, inserting
    /// `issue` if none exists yet.
    ///
    /// When the issue already exists the stored row is returned unchanged and
    /// the other fields of `issue` are ignored.
    pub async fn create_or_get(&self, issue: &Issue) -> Result<Issue> {
        if let Some(existing) = self
            .get_by_newspaper_and_date(&issue.newspaper_id, issue.issue_date)
            .await?
        {
            return Ok(existing);
        }

        let issue_date = format_date(&issue.issue_date);
        let metadata = serde_json::to_string(&issue.metadata)?;
        let created_at = format_datetime(&issue.created_at);
        let new = NewIssue {
            id: &issue.id,
            newspaper_id: &issue.newspaper_id,
            issue_date: &issue_date,
            num_pages: issue.num_pages,
            source_type: &issue.source_type,
            source_external_id: issue.source_external_id.as_deref(),
            metadata: &metadata,
            created_at: &created_at,
        };

        with_conn!(self.pool, conn, {
            diesel::insert_into(issues::table)
                .values(&new)
                .on_conflict((issues::newspaper_id, issues::issue_date))
                .do_nothing()
                .execute(&mut conn)
                .await?
        });

        self.get_by_newspaper_and_date(&issue.newspaper_id, issue.issue_date)
            .await?
            .ok_or(RepositoryError::WriteFailed {
                action: "upsert",
                table: "issues",
            })
    }

    /// Record the page count of an issue whose document was re-ingested.
    pub async fn set_num_pages(&self, issue_id: &str, num_pages: i32) -> Result<Issue> {
        let rows = with_conn!(self.pool, conn, {
            diesel::update(issues::table.find(issue_id))
                .set(issues::num_pages.eq(num_pages))
                .execute(&mut conn)
                .await?
        });

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "issue",
                id: issue_id.to_string(),
            });
        }
        self.get_by_id(issue_id)
            .await?
            .ok_or(RepositoryError::WriteFailed {
                action: "update",
                table: "issues",
            })
    }

    /// Issues of one newspaper, by date.
    pub async fn list_by_newspaper(
        &self,
        newspaper_id: &str,
        limit: i64,
        offset: i64,
        newest_first: bool,
    ) -> Result<Vec<Issue>> {
        with_conn!(self.pool, conn, {
            let mut query = issues::table
                .filter(issues::newspaper_id.eq(newspaper_id))
                .select(IssueRecord::as_select())
                .into_boxed();
            query = if newest_first {
                query.order((issues::issue_date.desc(), issues::id.asc()))
            } else {
                query.order((issues::issue_date.asc(), issues::id.asc()))
            };
            let records = query
                .limit(limit)
                .offset(offset)
                .load::<IssueRecord>(&mut conn)
                .await?;
            records
                .into_iter()
                .map(|r| Issue::try_from(r).map_err(RepositoryError::from))
                .collect()
        })
    }

    /// Issues published within `[start, end]` (either bound optional), newest first.
    pub async fn list_by_date_range(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        newspaper_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Issue>> {
        let start = start.map(|d| format_date(&d));
        let end = end.map(|d| format_date(&d));

        with_conn!(self.pool, conn, {
            let mut query = issues::table
                .select(IssueRecord::as_select())
                .into_boxed();
            if let Some(ref start) = start {
                query = query.filter(issues::issue_date.ge(start));
            }
            if let Some(ref end) = end {
                query = query.filter(issues::issue_date.le(end));
            }
            if let Some(nid) = newspaper_id {
                query = query.filter(issues::newspaper_id.eq(nid));
            }
            let records = query
                .order((issues::issue_date.desc(), issues::id.asc()))
                .limit(limit)
                .load::<IssueRecord>(&mut conn)
                .await?;
            records
                .into_iter()
                .map(|r| Issue::try_from(r).map_err(RepositoryError::from))
                .collect()
        })
    }
}
