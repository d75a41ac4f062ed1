//! Batch driver: load -> derive timestamps -> replace table -> report.

use metrotime_parser::{parse_schedule, ScheduleOptions, ScheduleTable};
use tracing::info;

use crate::config::{RunConfig, StoredTable};
use crate::conversion::add_derived_columns;
use crate::db;
use crate::error::{PipelineError, Result};
use crate::report::{collect_samples, RunReport};
use crate::repository::{DateCount, ScheduleRepository, SqliteRepository};

/// Runs one full conversion against the SQLite file named in `config`.
pub async fn run(config: &RunConfig) -> Result<RunReport> {
    let bytes = tokio::fs::read(&config.input_path)
        .await
        .map_err(|source| PipelineError::Io {
            path: config.input_path.display().to_string(),
            source,
        })?;
    let table = load_schedule(&bytes, config)?;

    let pool = db::connect(&config.database_path).await?;
    let repository = SqliteRepository::new(pool);
    let report = convert_and_store(&repository, table, config).await?;
    repository.pool().close().await;
    Ok(report)
}

/// Decodes and parses raw schedule bytes with the configured encoding,
/// delimiter and time columns.
pub fn load_schedule(bytes: &[u8], config: &RunConfig) -> Result<ScheduleTable> {
    let time_columns = config.columns.sources();
    let options = ScheduleOptions {
        encoding: &config.encoding,
        delimiter: config.delimiter,
        time_columns: &time_columns,
    };
    let table = parse_schedule(bytes, &options)?;
    info!(
        rows = table.height(),
        columns = table.df.width(),
        encoding = table.encoding,
        file_hash = %table.file_hash,
        "loaded schedule"
    );
    Ok(table)
}

pub async fn convert_and_store<R>(
    repository: &R,
    table: ScheduleTable,
    config: &RunConfig,
) -> Result<RunReport>
where
    R: ScheduleRepository + ?Sized,
{
    let ScheduleTable {
        df,
        file_hash,
        encoding,
    } = table;
    let total_records = df.height();

    let conversion = add_derived_columns(df, &config.columns, config.base_date)?;
    let samples = collect_samples(
        &conversion.df,
        &conversion.departure.source,
        &conversion.departure.derived,
        config.report,
    )?;

    repository
        .replace_table(&config.table_name, &conversion.df)
        .await?;

    let stored = config.stored_table();
    let stored_records = repository.count_rows(&stored.table_name).await?;
    let date_distribution = repository
        .date_distribution(&stored.table_name, &stored.date_column)
        .await?;

    Ok(RunReport {
        input_path: config.input_path.display().to_string(),
        input_hash: file_hash,
        encoding: encoding.to_string(),
        base_date: config.base_date,
        table_name: config.table_name.clone(),
        total_records,
        arrival: conversion.arrival,
        departure: conversion.departure,
        samples,
        stored_records,
        date_distribution,
    })
}

/// Re-reads the per-date distribution of an already stored table.
pub async fn stored_distribution(target: &StoredTable) -> Result<(i64, Vec<DateCount>)> {
    let pool = db::connect(&target.database_path).await?;
    let repository = SqliteRepository::new(pool);
    let total = repository.count_rows(&target.table_name).await?;
    let distribution = repository
        .date_distribution(&target.table_name, &target.date_column)
        .await?;
    repository.pool().close().await;
    Ok((total, distribution))
}
