//! Mock HistoryStore implementation for testing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::injected_failure;
use crate::record::{LocationRecord, LocationReport, MonotonicClock};
use crate::storage::helpers::latest_per_user;
use crate::storage::{HistoryStore, Result};

/// Mock history store that keeps records in memory.
#[derive(Default)]
pub struct MockHistoryStore {
    records: RwLock<Vec<LocationRecord>>,
    clock: MonotonicClock,
    fail_on_append: AtomicBool,
    fail_on_query: AtomicBool,
    append_delay_ms: AtomicU64,
}

impl MockHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_append(&self, fail: bool) {
        self.fail_on_append.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_query(&self, fail: bool) {
        self.fail_on_query.store(fail, Ordering::SeqCst);
    }

    /// Make each append wait before storing, to model a slow backend.
    pub fn set_append_delay(&self, delay: Duration) {
        self.append_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub async fn stored_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl HistoryStore for MockHistoryStore {
    async fn append(&self, report: LocationReport) -> Result<LocationRecord> {
        if self.fail_on_append.load(Ordering::SeqCst) {
            return Err(injected_failure("append"));
        }
        let delay = self.append_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let mut records = self.records.write().await;
        let record = report.stamp(self.clock.now());
        records.push(record.clone());
        Ok(record)
    }

    async fn query_by_user(&self, user: &str) -> Result<Vec<LocationRecord>> {
        if self.fail_on_query.load(Ordering::SeqCst) {
            return Err(injected_failure("query"));
        }
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| r.user == user).cloned().collect())
    }

    async fn query_latest_per_user(&self) -> Result<BTreeMap<String, LocationRecord>> {
        if self.fail_on_query.load(Ordering::SeqCst) {
            return Err(injected_failure("query"));
        }
        let records = self.records.read().await;
        Ok(latest_per_user(records.iter().cloned()))
    }
}
