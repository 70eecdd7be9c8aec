//! Application configuration.
//!
//! Resolved once at process start from YAML files and environment variables,
//! then handed to the components that need it.

mod server;
mod storage;

pub use server::ServerConfig;
pub use storage::{
    FileConfig, MongodbConfig, SqliteConfig, StorageConfig, StorageModel, StorageType,
};

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "WHEREABOUTS_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "WHEREABOUTS";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "WHEREABOUTS_LOG";

/// Environment variable for the server port.
pub const PORT_ENV_VAR: &str = "PORT";
/// Environment variable for the MongoDB connection URI.
pub const MONGODB_URI_ENV_VAR: &str = "MONGODB_URI";
/// Environment variable for the MongoDB database name.
pub const MONGODB_DB_ENV_VAR: &str = "MONGODB_DB";
/// Environment variable for the JSON data file path.
pub const DATA_FILE_ENV_VAR: &str = "DATA_FILE";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    /// 5. `PORT`, `MONGODB_URI`, `MONGODB_DB`, `DATA_FILE`
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let mut config: Config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse configuration from a YAML document, without environment input.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, File, FileFormat};

        let config = ConfigLib::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Apply the plain environment variables understood by earlier
    /// deployments of the service.
    fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(port) = lookup(PORT_ENV_VAR) {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: PORT_ENV_VAR,
                value: port.clone(),
            })?;
        }

        if let Some(uri) = lookup(MONGODB_URI_ENV_VAR) {
            self.storage.mongodb.uri = uri;
        }

        if let Some(database) = lookup(MONGODB_DB_ENV_VAR) {
            self.storage.mongodb.database = database;
        }

        if let Some(path) = lookup(DATA_FILE_ENV_VAR) {
            self.storage.file.path = path;
        }

        Ok(())
    }
}
