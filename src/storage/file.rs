//! File-backed history store.
//!
//! The whole history lives in one JSON array file. Each append reads the
//! file, pushes the new record, and writes the file back:
//!
//! ```text
//! append:  [write lock] read -> decode -> push -> encode -> write tmp -> rename
//! query:   [read lock]  read -> decode -> filter/fold
//! ```
//!
//! Appends are serialized by an in-process write lock so concurrent callers
//! observe each other's records. The replacement is written to a sibling
//! temporary file and renamed over the original, so a reader (in this
//! process or another) never sees a half-written array.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::helpers::latest_per_user;
use super::{HistoryStore, Result};
use crate::record::{
    decode_collection, encode_collection, LocationRecord, LocationReport, MonotonicClock,
};

/// History store persisted as a single JSON array file.
pub struct FileHistoryStore {
    path: PathBuf,
    temp_path: PathBuf,
    lock: RwLock<()>,
    clock: MonotonicClock,
}

impl FileHistoryStore {
    /// Open the store, creating the file (as `[]`) and its parent directory
    /// if they don't exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let store = Self {
            temp_path: temp_path_for(&path),
            path,
            lock: RwLock::new(()),
            clock: MonotonicClock::new(),
        };

        if fs::try_exists(&store.path).await? {
            let records = store.load().await?;
            if let Some(newest) = records.iter().map(|r| r.timestamp).max() {
                store.clock.observe(newest);
            }
            debug!(
                path = %store.path.display(),
                records = records.len(),
                "opened location history file"
            );
        } else {
            store.persist(&[]).await?;
            debug!(path = %store.path.display(), "created location history file");
        }

        Ok(store)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the whole file. A missing file reads as empty.
    async fn load(&self) -> Result<Vec<LocationRecord>> {
        match fs::read(&self.path).await {
            Ok(raw) => Ok(decode_collection(&raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the file contents atomically (temp file + rename).
    async fn persist(&self, records: &[LocationRecord]) -> Result<()> {
        let encoded = encode_collection(records)?;
        let mut temp = fs::File::create(&self.temp_path).await?;
        temp.write_all(&encoded).await?;
        // Contents must be durable before the rename makes them visible.
        temp.sync_all().await?;
        drop(temp);

        if let Err(e) = fs::rename(&self.temp_path, &self.path).await {
            if let Err(cleanup) = fs::remove_file(&self.temp_path).await {
                warn!(
                    path = %self.temp_path.display(),
                    error = %cleanup,
                    "failed to remove temporary location file"
                );
            }
            return Err(e.into());
        }

        Ok(())
    }
}

/// `locations.json` -> `locations.json.tmp`, in the same directory so the
/// rename never crosses filesystems.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("locations"));
    name.push(".tmp");
    path.with_file_name(name)
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn append(&self, report: LocationReport) -> Result<LocationRecord> {
        let _guard = self.lock.write().await;

        let mut records = self.load().await?;
        let record = report.stamp(self.clock.now());
        records.push(record.clone());
        self.persist(&records).await?;

        debug!(
            user = %record.user,
            records = records.len(),
            "appended location"
        );

        Ok(record)
    }

    async fn query_by_user(&self, user: &str) -> Result<Vec<LocationRecord>> {
        let _guard = self.lock.read().await;

        let records = self.load().await?;
        Ok(records.into_iter().filter(|r| r.user == user).collect())
    }

    async fn query_latest_per_user(&self) -> Result<BTreeMap<String, LocationRecord>> {
        let _guard = self.lock.read().await;

        let records = self.load().await?;
        Ok(latest_per_user(records))
    }
}
