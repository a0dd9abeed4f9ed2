//! Diesel-based newspaper repository.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{NewNewspaper, NewspaperRecord};
use super::pool::DbPool;
use super::{format_datetime, parse_datetime, RepositoryError, Result};
use crate::models::Newspaper;
use crate::schema::newspapers;
use crate::with_conn;

diesel::define_sql_function!(fn lower(x: diesel::sql_types::Text) -> diesel::sql_types::Text);

/// Convert a database record to a domain model.
impl TryFrom<NewspaperRecord> for Newspaper {
    type Error = diesel::result::Error;

    fn try_from(record: NewspaperRecord) -> std::result::Result<Self, Self::Error> {
        Ok(Newspaper {
            id: record.id,
            name: record.name,
            city: record.city,
            country: record.country,
            start_year: record.start_year,
            end_year: record.end_year,
            description: record.description,
            source_type: record.source_type,
            created_at: parse_datetime(&record.created_at),
        })
    }
}

/// Escape LIKE wildcards so user input matches literally.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped.to_lowercase())
}

/// Diesel-based newspaper repository.
#[derive(Clone)]
pub struct NewspaperRepository {
    pool: DbPool,
}

impl NewspaperRepository {
    /// Create a new repository with an existing pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    crud_methods!(
        table: newspapers,
        record: NewspaperRecord,
        model: Newspaper,
        order: (newspapers::name.asc(), newspapers::id.asc())
    );

    /// Insert a newspaper. Fails with `Duplicate` if the name is taken.
    pub async fn create(&self, newspaper: &Newspaper) -> Result<Newspaper> {
        let created_at = format_datetime(&newspaper.created_at);
        let new = NewNewspaper {
            id: &newspaper.id,
            name: &newspaper.name,
            city: newspaper.city.as_deref(),
            country: newspaper.country.as_deref(),
            start_year: newspaper.start_year,
            end_year: newspaper.end_year,
            description: newspaper.description.as_deref(),
            source_type: &newspaper.source_type,
            created_at: &created_at,
        };

        let result = with_conn!(self.pool, conn, {
            diesel::insert_into(newspapers::table)
                .values(&new)
                .execute(&mut conn)
                .await
        });

        match result {
            Ok(_) => self
                .get_by_id(&newspaper.id)
                .await?
                .ok_or(RepositoryError::WriteFailed {
                    action: "create",
                    table: "newspapers",
                }),
            Err(e) if super::util::is_unique_violation(&e) => Err(RepositoryError::Duplicate {
                entity: "newspaper",
                key: newspaper.name.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Get a newspaper by its exact name.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Newspaper>> {
        with_conn!(self.pool, conn, {
            let record = newspapers::table
                .filter(newspapers::name.eq(name))
                .select(NewspaperRecord::as_select())
                .first::<NewspaperRecord>(&mut conn)
                .await
                .optional()?;
            record
                .map(Newspaper::try_from)
                .transpose()
                .map_err(RepositoryError::from)
        })
    }

    /// Return the newspaper with this name, creating it if needed.
    ///
    /// Safe under concurrent calls: the insert is keyed on the unique name
    /// and the winning row is read back.
    pub async fn get_or_create(&self, name: &str) -> Result<Newspaper> {
        if let Some(existing) = self.get_by_name(name).await? {
            return Ok(existing);
        }

        let newspaper = Newspaper::new(name);
        let created_at = format_datetime(&newspaper.created_at);
        let new = NewNewspaper {
            id: &newspaper.id,
            name: &newspaper.name,
            city: None,
            country: None,
            start_year: None,
            end_year: None,
            description: None,
            source_type: &newspaper.source_type,
            created_at: &created_at,
        };

        let inserted = with_conn!(self.pool, conn, {
            diesel::insert_into(newspapers::table)
                .values(&new)
                .on_conflict(newspapers::name)
                .do_nothing()
                .execute(&mut conn)
                .await?
        });
        if inserted > 0 {
            tracing::debug!("Created newspaper '{}' ({})", name, newspaper.id);
        }

        self.get_by_name(name)
            .await?
            .ok_or(RepositoryError::WriteFailed {
                action: "upsert",
                table: "newspapers",
            })
    }

    /// Case-insensitive substring search on the name.
    pub async fn search_by_name(&self, query: &str, limit: i64) -> Result<Vec<Newspaper>> {
        let pattern = like_pattern(query);

        with_conn!(self.pool, conn, {
            let records = newspapers::table
                .filter(lower(newspapers::name).like(&pattern).escape('\\'))
                .select(NewspaperRecord::as_select())
                .order(newspapers::name.asc())
                .limit(limit)
                .load::<NewspaperRecord>(&mut conn)
                .await?;
            records
                .into_iter()
                .map(|r| Newspaper::try_from(r).map_err(RepositoryError::from))
                .collect()
        })
    }
}
