use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("unknown text encoding '{0}'")]
    UnknownEncoding(String),

    #[error("input is not valid {encoding} text")]
    Decode { encoding: &'static str },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("header column {index} is blank")]
    BlankHeader { index: usize },

    #[error("header column '{0}' appears more than once")]
    DuplicateColumn(String),

    #[error("required column '{0}' not found in header")]
    MissingColumn(String),

    #[error("schedule file did not contain a header row")]
    EmptyInput,

    #[error("polars operation failed: {0}")]
    Polars(#[from] PolarsError),
}
