use std::collections::HashSet;

use blake3::Hasher;
use csv::ReaderBuilder;
use encoding_rs::Encoding;
use polars::prelude::*;

use crate::errors::ScheduleError;

/// Labels that legacy tooling emits but the WHATWG registry does not know.
const ENCODING_ALIASES: &[(&str, &str)] = &[("cp949", "windows-949"), ("ms949", "windows-949")];

#[derive(Debug, Clone)]
pub struct ScheduleOptions<'a> {
    pub encoding: &'a str,
    pub delimiter: u8,
    /// Columns that must be present and are always kept as raw text.
    pub time_columns: &'a [&'a str],
}

#[derive(Debug, Clone)]
pub struct ScheduleTable {
    pub df: DataFrame,
    /// blake3 hex digest of the undecoded input bytes.
    pub file_hash: String,
    /// Canonical name of the encoding actually used (a BOM wins over the label).
    pub encoding: &'static str,
}

impl ScheduleTable {
    pub fn height(&self) -> usize {
        self.df.height()
    }
}

pub fn resolve_encoding(label: &str) -> Result<&'static Encoding, ScheduleError> {
    let trimmed = label.trim();
    let canonical = ENCODING_ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(trimmed))
        .map(|(_, target)| *target)
        .unwrap_or(trimmed);

    Encoding::for_label(canonical.as_bytes())
        .ok_or_else(|| ScheduleError::UnknownEncoding(label.to_string()))
}

pub fn parse_schedule(
    bytes: &[u8],
    options: &ScheduleOptions<'_>,
) -> Result<ScheduleTable, ScheduleError> {
    let encoding = resolve_encoding(options.encoding)?;
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(ScheduleError::Decode {
            encoding: used.name(),
        });
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(options.delimiter)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|header| column_name(header, options.time_columns))
        .collect();
    validate_headers(&headers, options.time_columns)?;

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (column, field) in cells.iter_mut().zip(record.iter()) {
            column.push(if field.is_empty() {
                None
            } else {
                Some(field.to_string())
            });
        }
    }

    let columns = headers
        .iter()
        .zip(cells)
        .map(|(name, values)| {
            let keep_text = options.time_columns.contains(&name.as_str());
            build_column(name, values, keep_text)
        })
        .collect::<Vec<Column>>();

    Ok(ScheduleTable {
        df: DataFrame::new(columns)?,
        file_hash: compute_hash(bytes),
        encoding: used.name(),
    })
}

/// Time columns are matched with surrounding whitespace ignored and stored
/// under their configured name; every other header is kept verbatim.
fn column_name(header: &str, time_columns: &[&str]) -> String {
    let trimmed = header.trim();
    if time_columns.contains(&trimmed) {
        trimmed.to_string()
    } else {
        header.to_string()
    }
}

fn validate_headers(headers: &[String], required: &[&str]) -> Result<(), ScheduleError> {
    if headers.is_empty() {
        return Err(ScheduleError::EmptyInput);
    }

    let mut seen = HashSet::new();
    for (index, header) in headers.iter().enumerate() {
        if header.trim().is_empty() {
            return Err(ScheduleError::BlankHeader { index });
        }
        if !seen.insert(header.as_str()) {
            return Err(ScheduleError::DuplicateColumn(header.clone()));
        }
    }

    for name in required {
        if !seen.contains(name) {
            return Err(ScheduleError::MissingColumn((*name).to_string()));
        }
    }
    Ok(())
}

/// Pass-through columns are narrowed to Int64 or Float64 when every present
/// value parses; zero-padded codes stay text so `0150` survives the round trip.
fn build_column(name: &str, values: Vec<Option<String>>, keep_text: bool) -> Column {
    let present: Vec<&str> = values.iter().flatten().map(String::as_str).collect();
    let numeric_candidate =
        !keep_text && !present.is_empty() && !present.iter().any(|v| has_padding(v));

    if numeric_candidate {
        if present.iter().all(|v| v.parse::<i64>().is_ok()) {
            let ints: Vec<Option<i64>> = values
                .iter()
                .map(|v| v.as_deref().and_then(|s| s.parse().ok()))
                .collect();
            return Series::new(name.into(), ints).into();
        }
        if present.iter().all(|v| v.parse::<f64>().is_ok()) {
            let floats: Vec<Option<f64>> = values
                .iter()
                .map(|v| v.as_deref().and_then(|s| s.parse().ok()))
                .collect();
            return Series::new(name.into(), floats).into();
        }
    }

    Series::new(name.into(), values).into()
}

fn has_padding(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.")
}

fn compute_hash(contents: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(contents);
    hasher.finalize().to_hex().to_string()
}
