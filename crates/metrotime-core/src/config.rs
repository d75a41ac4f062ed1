//! Run configuration.
//!
//! Settings are assembled from layers, lowest priority first: built-in
//! defaults, an optional TOML file, `METROTIME_*` environment variables (a
//! `.env` file is honoured), then whatever the caller overrides last.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{PipelineError, Result};

pub const ENV_INPUT: &str = "METROTIME_INPUT";
pub const ENV_DATABASE: &str = "METROTIME_DATABASE";
pub const ENV_BASE_DATE: &str = "METROTIME_BASE_DATE";
pub const ENV_TABLE: &str = "METROTIME_TABLE";
pub const ENV_ENCODING: &str = "METROTIME_ENCODING";

pub const DEFAULT_DATABASE_PATH: &str = "metro_datetime.db";
pub const DEFAULT_TABLE_NAME: &str = "Metro_Line_1_Schedule";
pub const DEFAULT_ENCODING: &str = "cp949";
pub const DEFAULT_ARRIVAL_COLUMN: &str = "열차도착시간";
pub const DEFAULT_DEPARTURE_COLUMN: &str = "열차출발시간";
pub const DEFAULT_DERIVED_SUFFIX: &str = "_dt";

const BASE_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub input_path: PathBuf,
    pub database_path: PathBuf,
    /// Service day that overflow hours are resolved against.
    pub base_date: NaiveDate,
    pub table_name: String,
    pub encoding: String,
    pub delimiter: u8,
    pub columns: ColumnConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnConfig {
    pub arrival: String,
    pub departure: String,
    pub suffix: String,
}

impl ColumnConfig {
    pub fn derived_name(&self, source: &str) -> String {
        format!("{source}{}", self.suffix)
    }

    pub fn sources(&self) -> [&str; 2] {
        [self.arrival.as_str(), self.departure.as_str()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportConfig {
    pub overflow_samples: usize,
    pub normal_samples: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            overflow_samples: 5,
            normal_samples: 3,
        }
    }
}

/// One partial source of settings. Unset fields defer to lower layers.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub input_path: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub base_date: Option<NaiveDate>,
    pub table_name: Option<String>,
    pub encoding: Option<String>,
    pub delimiter: Option<char>,
    #[serde(default)]
    pub columns: ColumnLayer,
    #[serde(default)]
    pub report: ReportLayer,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ColumnLayer {
    pub arrival: Option<String>,
    pub departure: Option<String>,
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ReportLayer {
    pub overflow_samples: Option<usize>,
    pub normal_samples: Option<usize>,
}

impl ConfigLayer {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reads `METROTIME_*` variables after loading `.env` if one exists.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_date = lookup(ENV_BASE_DATE)
            .map(|raw| parse_base_date(&raw))
            .transpose()?;

        Ok(Self {
            input_path: lookup(ENV_INPUT).map(PathBuf::from),
            database_path: lookup(ENV_DATABASE).map(PathBuf::from),
            base_date,
            table_name: lookup(ENV_TABLE),
            encoding: lookup(ENV_ENCODING),
            ..Self::default()
        })
    }

    /// Overlays `higher` on top of `self`; set fields in `higher` win.
    pub fn merge(self, higher: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            input_path: higher.input_path.or(self.input_path),
            database_path: higher.database_path.or(self.database_path),
            base_date: higher.base_date.or(self.base_date),
            table_name: higher.table_name.or(self.table_name),
            encoding: higher.encoding.or(self.encoding),
            delimiter: higher.delimiter.or(self.delimiter),
            columns: ColumnLayer {
                arrival: higher.columns.arrival.or(self.columns.arrival),
                departure: higher.columns.departure.or(self.columns.departure),
                suffix: higher.columns.suffix.or(self.columns.suffix),
            },
            report: ReportLayer {
                overflow_samples: higher
                    .report
                    .overflow_samples
                    .or(self.report.overflow_samples),
                normal_samples: higher.report.normal_samples.or(self.report.normal_samples),
            },
        }
    }
}

impl RunConfig {
    /// Merges `layers` in order (later wins) and fills in defaults.
    pub fn from_layers<I>(layers: I) -> Result<Self>
    where
        I: IntoIterator<Item = ConfigLayer>,
    {
        let merged = layers
            .into_iter()
            .fold(ConfigLayer::default(), ConfigLayer::merge);

        let input_path = merged.input_path.ok_or_else(|| {
            PipelineError::Config(format!("input path is required (set {ENV_INPUT})"))
        })?;
        let base_date = merged.base_date.ok_or_else(|| {
            PipelineError::Config(format!("base date is required (set {ENV_BASE_DATE})"))
        })?;
        let delimiter = delimiter_byte(merged.delimiter.unwrap_or(','))?;
        let defaults = ReportConfig::default();

        let config = Self {
            input_path,
            database_path: merged
                .database_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            base_date,
            table_name: merged
                .table_name
                .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
            encoding: merged
                .encoding
                .unwrap_or_else(|| DEFAULT_ENCODING.to_string()),
            delimiter,
            columns: ColumnConfig {
                arrival: merged
                    .columns
                    .arrival
                    .unwrap_or_else(|| DEFAULT_ARRIVAL_COLUMN.to_string()),
                departure: merged
                    .columns
                    .departure
                    .unwrap_or_else(|| DEFAULT_DEPARTURE_COLUMN.to_string()),
                suffix: merged
                    .columns
                    .suffix
                    .unwrap_or_else(|| DEFAULT_DERIVED_SUFFIX.to_string()),
            },
            report: ReportConfig {
                overflow_samples: merged
                    .report
                    .overflow_samples
                    .unwrap_or(defaults.overflow_samples),
                normal_samples: merged
                    .report
                    .normal_samples
                    .unwrap_or(defaults.normal_samples),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(PipelineError::Config("table name must not be empty".into()));
        }
        if self.table_name.contains('\0') {
            return Err(PipelineError::Config("table name must not contain NUL".into()));
        }
        if self.columns.arrival == self.columns.departure {
            return Err(PipelineError::Config(format!(
                "arrival and departure columns must differ (both '{}')",
                self.columns.arrival
            )));
        }
        if self.columns.suffix.is_empty() {
            return Err(PipelineError::Config(
                "derived column suffix must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Where an augmented table lives and which derived column dates it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTable {
    pub database_path: PathBuf,
    pub table_name: String,
    pub date_column: String,
}

impl StoredTable {
    /// Resolves only the storage settings, so no input path or base date is
    /// required.
    pub fn from_layers<I>(layers: I) -> Result<Self>
    where
        I: IntoIterator<Item = ConfigLayer>,
    {
        let merged = layers
            .into_iter()
            .fold(ConfigLayer::default(), ConfigLayer::merge);
        let table_name = merged
            .table_name
            .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string());
        if table_name.trim().is_empty() {
            return Err(PipelineError::Config("table name must not be empty".into()));
        }
        let departure = merged
            .columns
            .departure
            .unwrap_or_else(|| DEFAULT_DEPARTURE_COLUMN.to_string());
        let suffix = merged
            .columns
            .suffix
            .unwrap_or_else(|| DEFAULT_DERIVED_SUFFIX.to_string());

        Ok(Self {
            database_path: merged
                .database_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            table_name,
            date_column: format!("{departure}{suffix}"),
        })
    }
}

impl RunConfig {
    pub fn stored_table(&self) -> StoredTable {
        StoredTable {
            database_path: self.database_path.clone(),
            table_name: self.table_name.clone(),
            date_column: self.columns.derived_name(&self.columns.departure),
        }
    }
}

pub fn parse_base_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), BASE_DATE_FORMAT).map_err(|err| {
        PipelineError::Config(format!("invalid base date '{raw}' (expected YYYY-MM-DD): {err}"))
    })
}

fn delimiter_byte(delimiter: char) -> Result<u8> {
    if delimiter.is_ascii() && delimiter != '\n' && delimiter != '\r' && delimiter != '"' {
        Ok(delimiter as u8)
    } else {
        Err(PipelineError::Config(format!(
            "delimiter {delimiter:?} must be a single ASCII character other than a quote or newline"
        )))
    }
}
