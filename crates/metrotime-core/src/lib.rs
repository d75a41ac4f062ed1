pub mod config;
pub mod conversion;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod repository;

pub use config::{ConfigLayer, RunConfig, StoredTable};
pub use error::{PipelineError, Result};
pub use pipeline::{convert_and_store, load_schedule, run, stored_distribution};
pub use report::RunReport;
