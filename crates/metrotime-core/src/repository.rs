//! Relational persistence for augmented schedule tables.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use polars::prelude::*;
use serde::Serialize;
use sqlx::query_builder::Separated;
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::{PipelineError, Result};

/// SQLite rejects statements with more bound parameters than this.
const MAX_BIND_PARAMS: usize = 32_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DateCount {
    pub date: String,
    pub count: i64,
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Replaces `table` with the contents of `df`, returning rows written.
    async fn replace_table(&self, table: &str, df: &DataFrame) -> Result<u64>;
    async fn count_rows(&self, table: &str) -> Result<i64>;
    /// Row counts grouped by the calendar date of `column`, nulls excluded.
    async fn date_distribution(&self, table: &str, column: &str) -> Result<Vec<DateCount>>;
}

#[derive(Clone)]
pub struct SqliteRepository {
    pool: DbPool,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl ScheduleRepository for SqliteRepository {
    async fn replace_table(&self, table: &str, df: &DataFrame) -> Result<u64> {
        let columns = bind_columns(df)?;
        let staging = staging_table_name(table);
        let column_list = columns
            .iter()
            .map(|column| quote_ident(column.name))
            .collect::<Vec<_>>()
            .join(", ");

        let mut tx = self.pool.begin().await?;

        let create = create_table_sql(&staging, &columns);
        sqlx::query(&create).execute(&mut *tx).await?;

        let height = df.height();
        let rows_per_batch = (MAX_BIND_PARAMS / columns.len().max(1)).max(1);
        let insert_prefix = format!("INSERT INTO {} ({column_list}) ", quote_ident(&staging));
        let mut written = 0u64;
        let mut start = 0usize;
        while start < height {
            let end = (start + rows_per_batch).min(height);
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(&insert_prefix);
            builder.push_values(start..end, |mut row, idx| {
                for column in &columns {
                    column.bind(&mut row, idx);
                }
            });
            written += builder.build().execute(&mut *tx).await?.rows_affected();
            debug!(table = %staging, start, end, "inserted batch");
            start = end;
        }

        let drop_target = format!("DROP TABLE IF EXISTS {}", quote_ident(table));
        sqlx::query(&drop_target).execute(&mut *tx).await?;
        let rename = format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_ident(&staging),
            quote_ident(table)
        );
        sqlx::query(&rename).execute(&mut *tx).await?;

        tx.commit().await?;
        info!(table, rows = written, "replaced table");
        Ok(written)
    }

    async fn count_rows(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn date_distribution(&self, table: &str, column: &str) -> Result<Vec<DateCount>> {
        let column = quote_ident(column);
        let sql = format!(
            r#"
                SELECT DATE({column}) AS date, COUNT(*) AS count
                FROM {}
                WHERE {column} IS NOT NULL
                GROUP BY DATE({column})
                ORDER BY date
            "#,
            quote_ident(table)
        );
        let rows = sqlx::query_as::<_, DateCount>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

/// A per-write name so an existing user table is never mistaken for staging.
fn staging_table_name(table: &str) -> String {
    format!("{table}__staging_{}", Uuid::new_v4().simple())
}

/// Double-quotes an SQL identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

struct BindColumn<'a> {
    name: &'a str,
    values: BindValues<'a>,
}

enum BindValues<'a> {
    Text(&'a StringChunked),
    Integer(&'a Int64Chunked),
    Real(&'a Float64Chunked),
    Timestamp(&'a DatetimeChunked, TimeUnit),
}

impl BindColumn<'_> {
    fn affinity(&self) -> &'static str {
        match self.values {
            BindValues::Text(_) => "TEXT",
            BindValues::Integer(_) => "INTEGER",
            BindValues::Real(_) => "REAL",
            BindValues::Timestamp(..) => "TIMESTAMP",
        }
    }

    fn bind(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>, idx: usize) {
        match self.values {
            BindValues::Text(values) => {
                row.push_bind(values.get(idx).map(str::to_string));
            }
            BindValues::Integer(values) => {
                row.push_bind(values.get(idx));
            }
            BindValues::Real(values) => {
                row.push_bind(values.get(idx));
            }
            BindValues::Timestamp(values, unit) => {
                row.push_bind(values.get(idx).and_then(|raw| to_naive(raw, unit)));
            }
        }
    }
}

fn bind_columns(df: &DataFrame) -> Result<Vec<BindColumn<'_>>> {
    df.get_columns()
        .iter()
        .map(|column| {
            let series = column.as_materialized_series();
            let values = match series.dtype() {
                DataType::String => BindValues::Text(series.str()?),
                DataType::Int64 => BindValues::Integer(series.i64()?),
                DataType::Float64 => BindValues::Real(series.f64()?),
                DataType::Datetime(unit, _) => BindValues::Timestamp(series.datetime()?, *unit),
                other => {
                    return Err(PipelineError::Config(format!(
                        "column '{}' has unsupported type {other}",
                        column.name()
                    )))
                }
            };
            Ok(BindColumn {
                name: column.name().as_str(),
                values,
            })
        })
        .collect()
}

fn create_table_sql(table: &str, columns: &[BindColumn<'_>]) -> String {
    let definitions = columns
        .iter()
        .map(|column| format!("{} {}", quote_ident(column.name), column.affinity()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({definitions})", quote_ident(table))
}

fn to_naive(raw: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let dt = match unit {
        TimeUnit::Nanoseconds => Some(DateTime::<Utc>::from_timestamp_nanos(raw)),
        TimeUnit::Microseconds => DateTime::<Utc>::from_timestamp_micros(raw),
        TimeUnit::Milliseconds => DateTime::<Utc>::from_timestamp_millis(raw),
    };
    dt.map(|dt| dt.naive_utc())
}
