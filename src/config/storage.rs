//! Storage configuration types.

use serde::Deserialize;

/// Storage backend discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Single JSON file holding the whole history.
    #[default]
    File,
    /// Embedded SQLite database.
    Sqlite,
    /// MongoDB collections.
    Mongodb,
}

/// Consistency model of the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageModel {
    /// Append-only: every report is kept.
    #[default]
    History,
    /// One row per user, replaced on each report.
    Latest,
}

/// Storage configuration (discriminated union).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// History or latest-only retention.
    pub model: StorageModel,
    /// File-specific configuration.
    pub file: FileConfig,
    /// SQLite-specific configuration.
    pub sqlite: SqliteConfig,
    /// MongoDB-specific configuration.
    pub mongodb: MongodbConfig,
}

/// File-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Path of the JSON array file.
    pub path: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: "./locations.json".to_string(),
        }
    }
}

/// SQLite-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Path to database file.
    pub path: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: "./data/locations.db".to_string(),
        }
    }
}

/// MongoDB-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MongodbConfig {
    /// MongoDB connection URI. Must be set when `type: mongodb`.
    pub uri: String,
    /// Database name.
    pub database: String,
}

impl Default for MongodbConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            database: "tracker".to_string(),
        }
    }
}
