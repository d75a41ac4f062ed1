use chrono::NaiveDate;
use metrotime_parser::{convert, OverflowTime};
use polars::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ColumnConfig;
use crate::error::{PipelineError, Result};

/// Tally for one derived timestamp column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSummary {
    pub source: String,
    pub derived: String,
    pub converted: usize,
    pub absent: usize,
    /// Rows whose raw hour was 24 or later.
    pub overflow: usize,
}

#[derive(Debug, Clone)]
pub struct Conversion {
    pub df: DataFrame,
    pub arrival: ColumnSummary,
    pub departure: ColumnSummary,
}

/// Appends `<source><suffix>` timestamp columns for arrival and departure.
/// Every input row is kept in order; values that do not normalize stay null.
pub fn add_derived_columns(
    mut df: DataFrame,
    columns: &ColumnConfig,
    base_date: NaiveDate,
) -> Result<Conversion> {
    let arrival = append_derived(&mut df, &columns.arrival, columns, base_date)?;
    let departure = append_derived(&mut df, &columns.departure, columns, base_date)?;

    info!(
        rows = df.height(),
        arrival_converted = arrival.converted,
        departure_converted = departure.converted,
        departure_overflow = departure.overflow,
        %base_date,
        "derived timestamp columns"
    );

    Ok(Conversion {
        df,
        arrival,
        departure,
    })
}

fn append_derived(
    df: &mut DataFrame,
    source: &str,
    columns: &ColumnConfig,
    base_date: NaiveDate,
) -> Result<ColumnSummary> {
    let derived = columns.derived_name(source);
    if df.get_column_names_str().contains(&derived.as_str()) {
        return Err(PipelineError::Config(format!(
            "derived column '{derived}' already exists in the input"
        )));
    }

    let (series, summary) = derive_timestamp_column(df, source, &derived, base_date)?;
    if summary.converted == 0 && df.height() > 0 {
        warn!(source, "no values in column could be normalized");
    }
    df.with_column(series)?;
    Ok(summary)
}

/// Builds a `Datetime(Microseconds)` series from the raw text column `source`.
pub fn derive_timestamp_column(
    df: &DataFrame,
    source: &str,
    derived: &str,
    base_date: NaiveDate,
) -> Result<(Series, ColumnSummary)> {
    let raw_series = df
        .column(source)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let raw = raw_series.str()?;

    let mut micros: Vec<Option<i64>> = Vec::with_capacity(raw.len());
    let mut overflow = 0usize;
    for value in raw.into_iter() {
        if value
            .and_then(OverflowTime::parse)
            .is_some_and(|time| time.is_overflow())
        {
            overflow += 1;
        }
        micros.push(convert(value, base_date).map(|ts| ts.and_utc().timestamp_micros()));
    }

    let converted = micros.iter().filter(|v| v.is_some()).count();
    let summary = ColumnSummary {
        source: source.to_string(),
        derived: derived.to_string(),
        converted,
        absent: micros.len() - converted,
        overflow,
    };

    let series = Series::new(derived.into(), micros)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
    Ok((series, summary))
}
