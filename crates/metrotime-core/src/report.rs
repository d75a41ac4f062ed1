use chrono::{DateTime, NaiveDate, Utc};
use metrotime_parser::{OverflowTime, TIMESTAMP_FORMAT};
use polars::prelude::*;
use serde::Serialize;

use crate::config::ReportConfig;
use crate::conversion::ColumnSummary;
use crate::error::Result;
use crate::repository::DateCount;

/// Observational summary of one run; nothing downstream depends on it.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub input_path: String,
    pub input_hash: String,
    pub encoding: String,
    pub base_date: NaiveDate,
    pub table_name: String,
    pub total_records: usize,
    pub arrival: ColumnSummary,
    pub departure: ColumnSummary,
    pub samples: SampleSet,
    pub stored_records: i64,
    pub date_distribution: Vec<DateCount>,
}

impl RunReport {
    /// Rows whose derived departure date was counted after the write.
    pub fn distributed_records(&self) -> i64 {
        self.date_distribution.iter().map(|entry| entry.count).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SampleSet {
    pub overflow: Vec<Sample>,
    pub normal: Vec<Sample>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sample {
    pub row: usize,
    pub raw: Option<String>,
    pub normalized: Option<String>,
}

/// Picks the first rows of `source` whose raw hour is 24 or later, and the
/// first rows that are not, pairing each with its derived value.
pub fn collect_samples(
    df: &DataFrame,
    source: &str,
    derived: &str,
    limits: ReportConfig,
) -> Result<SampleSet> {
    let raw_series = df
        .column(source)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let raw = raw_series.str()?;
    let normalized = df.column(derived)?.as_materialized_series().datetime()?;

    let mut samples = SampleSet::default();
    for (row, value) in raw.into_iter().enumerate() {
        if samples.overflow.len() >= limits.overflow_samples
            && samples.normal.len() >= limits.normal_samples
        {
            break;
        }

        let is_overflow = value
            .and_then(OverflowTime::parse)
            .is_some_and(|time| time.is_overflow());
        let bucket = if is_overflow {
            (&mut samples.overflow, limits.overflow_samples)
        } else {
            (&mut samples.normal, limits.normal_samples)
        };
        if bucket.0.len() >= bucket.1 {
            continue;
        }

        bucket.0.push(Sample {
            row,
            raw: value.map(str::to_string),
            normalized: normalized
                .get(row)
                .and_then(DateTime::<Utc>::from_timestamp_micros)
                .map(|ts| ts.naive_utc().format(TIMESTAMP_FORMAT).to_string()),
        });
    }
    Ok(samples)
}
