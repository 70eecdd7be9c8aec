//! Mock LatestStore implementation for testing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::injected_failure;
use crate::record::{LocationRecord, LocationReport, MonotonicClock};
use crate::storage::{LatestStore, Result};

/// Mock latest store keyed by user.
#[derive(Default)]
pub struct MockLatestStore {
    rows: RwLock<BTreeMap<String, LocationRecord>>,
    clock: MonotonicClock,
    fail_on_upsert: AtomicBool,
    fail_on_query: AtomicBool,
}

impl MockLatestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_upsert(&self, fail: bool) {
        self.fail_on_upsert.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_query(&self, fail: bool) {
        self.fail_on_query.store(fail, Ordering::SeqCst);
    }

    pub async fn stored_count(&self) -> usize {
        self.rows.read().await.len()
    }
}

#[async_trait]
impl LatestStore for MockLatestStore {
    async fn upsert(&self, report: LocationReport) -> Result<LocationRecord> {
        if self.fail_on_upsert.load(Ordering::SeqCst) {
            return Err(injected_failure("upsert"));
        }
        // Whole-row replacement under the write lock
        let mut rows = self.rows.write().await;
        let record = report.stamp(self.clock.now());
        rows.insert(record.user.clone(), record.clone());
        Ok(record)
    }

    async fn query_by_user(&self, user: &str) -> Result<Option<LocationRecord>> {
        if self.fail_on_query.load(Ordering::SeqCst) {
            return Err(injected_failure("query"));
        }
        Ok(self.rows.read().await.get(user).cloned())
    }

    async fn query_all(&self) -> Result<Vec<LocationRecord>> {
        if self.fail_on_query.load(Ordering::SeqCst) {
            return Err(injected_failure("query"));
        }
        Ok(self.rows.read().await.values().cloned().collect())
    }
}
