// crates/metrotime-core/src/db.rs

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::error::{PipelineError, Result};

pub type DbPool = Pool<Sqlite>;

/// Opens (creating if needed) the SQLite file at `database_path`.
///
/// A run is the only writer, so the pool holds a single connection; the
/// parent directory is created when missing.
pub async fn connect(database_path: &Path) -> Result<DbPool> {
    if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| PipelineError::Io {
                path: parent.display().to_string(),
                source,
            })?;
    }

    let options = SqliteConnectOptions::new()
        .filename(database_path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await?;

    info!(path = %database_path.display(), "SQLite connection pool established");
    Ok(pool)
}
