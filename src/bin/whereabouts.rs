//! whereabouts: location report server
//!
//! Records positions reported by named users and serves "where is X" and
//! "where is everyone" queries over HTTP.
//!
//! ## Architecture
//! ```text
//! [client] --(HTTP JSON)--> [whereabouts] --> [file | sqlite | mongodb]
//! ```
//!
//! ## Configuration
//! - `--config <path>` / WHEREABOUTS_CONFIG: YAML configuration file
//! - WHEREABOUTS__SERVER__PORT, WHEREABOUTS__STORAGE__TYPE, ...: overrides
//! - PORT, DATA_FILE, MONGODB_URI, MONGODB_DB: legacy overrides
//! - WHEREABOUTS_LOG: tracing filter (default: info)

use tracing::info;

use whereabouts::config::Config;
use whereabouts::handlers::rest;
use whereabouts::services::QueryService;
use whereabouts::storage::init_storage;
use whereabouts::utils::bootstrap::{init_tracing, parse_config_path, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = parse_config_path(std::env::args().skip(1));
    let config = Config::load(config_path.as_deref())?;

    let store = init_storage(&config.storage).await?;
    let service = QueryService::new(store);

    info!(
        storage = ?config.storage.storage_type,
        model = ?service.model(),
        "whereabouts started"
    );

    rest::serve(service, &config.server, shutdown_signal()).await?;

    Ok(())
}
