//! Query service.
//!
//! Exposes the same read and write operations whichever storage model is
//! active, so the HTTP layer never branches on the backend.

use serde::Serialize;
use tracing::debug;

use crate::config::StorageModel;
use crate::record::{LocationRecord, LocationReport, ReportError, UserPosition};
use crate::storage::{LocationStore, StorageError};

/// Errors surfaced by the query service.
///
/// Only the HTTP layer maps these to status codes.
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("{0}")]
    Validation(#[from] ReportError),

    #[error("no location recorded for user {user:?}")]
    NotFound { user: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A user's current position together with the positions that led to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserTrack {
    pub user: String,
    pub latest: LocationRecord,
    /// Oldest first. A single element under the latest-only model.
    pub history: Vec<LocationRecord>,
}

/// Stateless facade over whichever store was selected at startup.
#[derive(Debug, Clone)]
pub struct QueryService {
    store: LocationStore,
}

impl QueryService {
    pub fn new(store: LocationStore) -> Self {
        Self { store }
    }

    pub fn model(&self) -> StorageModel {
        self.store.model()
    }

    /// Persist a report and return the stored record.
    ///
    /// The write runs on its own task: if the caller is dropped (client
    /// disconnect, request timeout) the write still completes.
    pub async fn report(&self, report: LocationReport) -> Result<LocationRecord, LocationError> {
        let store = self.store.clone();
        let write = tokio::spawn(async move {
            match store {
                LocationStore::History(history) => history.append(report).await,
                LocationStore::Latest(latest) => latest.upsert(report).await,
            }
        });

        let record = write.await.map_err(StorageError::from)??;
        Ok(record)
    }

    /// The user's most recent record.
    pub async fn latest_for_user(&self, user: &str) -> Result<LocationRecord, LocationError> {
        let latest = match &self.store {
            LocationStore::History(history) => history.query_by_user(user).await?.pop(),
            LocationStore::Latest(latest) => latest.query_by_user(user).await?,
        };

        latest.ok_or_else(|| LocationError::NotFound {
            user: user.to_string(),
        })
    }

    /// The user's most recent record plus everything the store retains for
    /// them.
    pub async fn user_track(&self, user: &str) -> Result<UserTrack, LocationError> {
        let history = match &self.store {
            LocationStore::History(history) => history.query_by_user(user).await?,
            LocationStore::Latest(latest) => {
                latest.query_by_user(user).await?.into_iter().collect()
            }
        };

        let latest = history.last().cloned().ok_or_else(|| LocationError::NotFound {
            user: user.to_string(),
        })?;

        debug!(user, records = history.len(), "loaded user track");
        Ok(UserTrack {
            user: user.to_string(),
            latest,
            history,
        })
    }

    /// Every user's most recent position, ordered by user ascending.
    pub async fn all_latest(&self) -> Result<Vec<UserPosition>, LocationError> {
        let records: Vec<LocationRecord> = match &self.store {
            LocationStore::History(history) => {
                history.query_latest_per_user().await?.into_values().collect()
            }
            LocationStore::Latest(latest) => latest.query_all().await?,
        };

        debug!(users = records.len(), "loaded latest positions");
        Ok(records.into_iter().map(UserPosition::from).collect())
    }
}
