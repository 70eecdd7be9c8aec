//! Location storage backends.
//!
//! Two consistency models serve the same queries:
//! - [`HistoryStore`]: append-only, every report is kept in write order.
//! - [`LatestStore`]: one row per user, replaced in place on each report.
//!
//! A process selects one model at startup; [`LocationStore`] is the handle
//! that carries the selection to the query service.
//!
//! ## Backends
//!
//! | Backend   | History              | Latest              |
//! |-----------|----------------------|---------------------|
//! | file      | `FileHistoryStore`   | -                   |
//! | sqlite    | `SqliteHistoryStore` | `SqliteLatestStore` |
//! | mongodb   | `MongoHistoryStore`  | `MongoLatestStore`  |

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::config::{StorageConfig, StorageModel, StorageType};
use crate::record::{LocationRecord, LocationReport};

pub mod file;
pub mod helpers;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
#[cfg(feature = "mongodb")]
pub mod mongodb;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::FileHistoryStore;
#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockHistoryStore, MockLatestStore};
#[cfg(feature = "mongodb")]
pub use mongodb::{MongoHistoryStore, MongoLatestStore};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteHistoryStore, SqliteLatestStore};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "mongodb")]
    #[error("MongoDB error: {0}")]
    Mongo(#[from] ::mongodb::error::Error),

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),

    #[error("Unsupported storage configuration: {0}")]
    Unsupported(String),

    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Append-only location log.
///
/// Implementations:
/// - `FileHistoryStore`: single JSON file, whole-file rewrite per append
/// - `SqliteHistoryStore`: SQLite table with an autoincrement sequence
/// - `MongoHistoryStore`: MongoDB insert-only collection
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Stamp the report with the write time and append it.
    ///
    /// Records are never modified afterwards. Sequence order is the order in
    /// which the store serialized the appends.
    async fn append(&self, report: LocationReport) -> Result<LocationRecord>;

    /// All records for `user`, oldest first. Empty if the user never reported.
    async fn query_by_user(&self, user: &str) -> Result<Vec<LocationRecord>>;

    /// The most recent record of every user that ever reported.
    ///
    /// "Most recent" means greatest sequence position, not greatest
    /// timestamp. Keys iterate in ascending user order.
    async fn query_latest_per_user(&self) -> Result<BTreeMap<String, LocationRecord>>;
}

/// One current position per user.
///
/// Implementations:
/// - `SqliteLatestStore`: `INSERT ... ON CONFLICT DO UPDATE`
/// - `MongoLatestStore`: `updateOne` with `upsert: true`
#[async_trait]
pub trait LatestStore: Send + Sync {
    /// Insert the user's row or replace its coordinates and timestamp.
    ///
    /// Must be a single atomic write: concurrent upserts for the same user
    /// never leave a row mixing fields from different reports.
    async fn upsert(&self, report: LocationReport) -> Result<LocationRecord>;

    /// The user's current row, if any.
    async fn query_by_user(&self, user: &str) -> Result<Option<LocationRecord>>;

    /// Every current row, ordered by user ascending.
    async fn query_all(&self) -> Result<Vec<LocationRecord>>;
}

/// Store handle selected at construction time.
#[derive(Clone)]
pub enum LocationStore {
    History(Arc<dyn HistoryStore>),
    Latest(Arc<dyn LatestStore>),
}

impl LocationStore {
    /// Consistency model of the wrapped store.
    pub fn model(&self) -> StorageModel {
        match self {
            LocationStore::History(_) => StorageModel::History,
            LocationStore::Latest(_) => StorageModel::Latest,
        }
    }
}

impl std::fmt::Debug for LocationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LocationStore").field(&self.model()).finish()
    }
}

/// Initialize storage based on configuration.
pub async fn init_storage(config: &StorageConfig) -> Result<LocationStore> {
    info!(
        storage = ?config.storage_type,
        model = ?config.model,
        "initializing location storage"
    );

    match (config.storage_type, config.model) {
        (StorageType::File, StorageModel::History) => {
            let store = FileHistoryStore::open(&config.file.path).await?;
            Ok(LocationStore::History(Arc::new(store)))
        }
        (StorageType::File, StorageModel::Latest) => {
            error!("file storage only supports the history model");
            Err(StorageError::Unsupported(
                "file storage only supports the history model".to_string(),
            ))
        }
        #[cfg(feature = "sqlite")]
        (StorageType::Sqlite, model) => {
            let pool = sqlite::connect(&config.sqlite.path).await?;
            match model {
                StorageModel::History => {
                    let store = SqliteHistoryStore::new(pool);
                    store.init_schema().await?;
                    Ok(LocationStore::History(Arc::new(store)))
                }
                StorageModel::Latest => {
                    let store = SqliteLatestStore::new(pool);
                    store.init_schema().await?;
                    Ok(LocationStore::Latest(Arc::new(store)))
                }
            }
        }
        #[cfg(not(feature = "sqlite"))]
        (StorageType::Sqlite, _) => {
            error!("SQLite storage requested but 'sqlite' feature is not enabled");
            Err(StorageError::Unsupported(
                "SQLite feature not enabled".to_string(),
            ))
        }
        #[cfg(feature = "mongodb")]
        (StorageType::Mongodb, model) => {
            if config.mongodb.uri.is_empty() {
                error!("MongoDB storage requested but no URI is configured");
                return Err(StorageError::Unsupported(
                    "MongoDB URI is not set".to_string(),
                ));
            }
            let client = ::mongodb::Client::with_uri_str(&config.mongodb.uri).await?;
            let database = &config.mongodb.database;
            match model {
                StorageModel::History => {
                    let store = MongoHistoryStore::new(&client, database).await?;
                    Ok(LocationStore::History(Arc::new(store)))
                }
                StorageModel::Latest => {
                    let store = MongoLatestStore::new(&client, database).await?;
                    Ok(LocationStore::Latest(Arc::new(store)))
                }
            }
        }
        #[cfg(not(feature = "mongodb"))]
        (StorageType::Mongodb, _) => {
            error!("MongoDB storage requested but 'mongodb' feature is not enabled");
            Err(StorageError::Unsupported(
                "MongoDB feature not enabled".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfig;

    #[tokio::test]
    async fn test_init_file_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locations.json");
        let config = StorageConfig {
            file: FileConfig {
                path: path.to_string_lossy().into_owned(),
            },
            ..Default::default()
        };

        let store = init_storage(&config).await.unwrap();
        assert_eq!(store.model(), StorageModel::History);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_init_file_latest_unsupported() {
        let config = StorageConfig {
            model: StorageModel::Latest,
            ..Default::default()
        };

        let result = init_storage(&config).await;
        assert!(matches!(result, Err(StorageError::Unsupported(_))));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_init_sqlite_latest() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StorageConfig {
            storage_type: StorageType::Sqlite,
            model: StorageModel::Latest,
            ..Default::default()
        };
        config.sqlite.path = dir
            .path()
            .join("nested/locations.db")
            .to_string_lossy()
            .into_owned();

        let store = init_storage(&config).await.unwrap();
        assert_eq!(store.model(), StorageModel::Latest);
    }

    #[cfg(feature = "mongodb")]
    #[tokio::test]
    async fn test_init_mongodb_requires_uri() {
        let config = StorageConfig {
            storage_type: StorageType::Mongodb,
            ..Default::default()
        };

        let result = init_storage(&config).await;
        assert!(matches!(result, Err(StorageError::Unsupported(msg)) if msg == "MongoDB URI is not set"));
    }
}
