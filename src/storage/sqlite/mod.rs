//! SQLite implementations of storage interfaces.

mod history_store;
mod latest_store;

pub use history_store::SqliteHistoryStore;
pub use latest_store::SqliteLatestStore;

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::record::{parse_timestamp, LocationRecord};

use super::{Result, StorageError};

/// Open (creating if needed) a WAL-mode SQLite database at `path`.
pub async fn connect(path: &str) -> Result<SqlitePool> {
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let opts = SqliteConnectOptions::new()
        .filename(path)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(30))
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await?;

    Ok(pool)
}

/// Decode a row carrying `user`, `longitude`, `latitude`, `timestamp`.
fn record_from_row(row: &SqliteRow) -> Result<LocationRecord> {
    let timestamp: String = row.try_get("timestamp")?;
    let timestamp = parse_timestamp(&timestamp)
        .map_err(|e| StorageError::InvalidRecord(format!("timestamp {timestamp:?}: {e}")))?;

    Ok(LocationRecord {
        user: row.try_get("user")?,
        longitude: row.try_get("longitude")?,
        latitude: row.try_get("latitude")?,
        timestamp,
    })
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let opts = SqliteConnectOptions::new()
        .filename(":memory:")
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .expect("failed to create in-memory pool")
}
