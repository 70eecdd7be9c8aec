//! MongoDB LatestStore implementation.

use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::options::{FindOptions, IndexOptions, UpdateOptions};
use mongodb::{Client, Collection, IndexModel};
use tokio::sync::Mutex;
use tracing::debug;

use crate::record::{LocationRecord, LocationReport, MonotonicClock};
use crate::storage::{LatestStore, Result};

use super::{is_duplicate_key, record_from_document, to_bson_datetime, LATEST_COLLECTION};

/// MongoDB implementation of LatestStore.
///
/// A unique index on `user` keeps one document per user; each report is a
/// single `updateOne` with `upsert: true`.
pub struct MongoLatestStore {
    latest: Collection<Document>,
    clock: MonotonicClock,
    write_lock: Mutex<()>,
}

impl MongoLatestStore {
    /// Create a new MongoDB latest-position store.
    pub async fn new(client: &Client, database_name: &str) -> Result<Self> {
        let database = client.database(database_name);
        let latest = database.collection(LATEST_COLLECTION);

        let store = Self {
            latest,
            clock: MonotonicClock::new(),
            write_lock: Mutex::new(()),
        };
        store.init().await?;

        Ok(store)
    }

    /// Initialize indexes.
    async fn init(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "user": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.latest.create_index(index).await?;

        Ok(())
    }

    async fn write(&self, record: &LocationRecord) -> mongodb::error::Result<()> {
        let filter = doc! { "user": record.user.as_str() };
        let update = doc! {
            "$set": {
                "user": record.user.as_str(),
                "longitude": record.longitude,
                "latitude": record.latitude,
                "timestamp": to_bson_datetime(&record.timestamp),
            }
        };
        let options = UpdateOptions::builder().upsert(true).build();

        self.latest
            .update_one(filter, update)
            .with_options(options)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl LatestStore for MongoLatestStore {
    async fn upsert(&self, report: LocationReport) -> Result<LocationRecord> {
        let _guard = self.write_lock.lock().await;
        let record = report.stamp(self.clock.now());

        // Two writers inserting the same new user race on the unique index;
        // the loser retries as a plain update.
        match self.write(&record).await {
            Err(e) if is_duplicate_key(&e) => {
                debug!(user = %record.user, "upsert raced on insert, retrying");
                self.write(&record).await?;
            }
            other => other?,
        }

        debug!(user = %record.user, "upserted latest location");
        Ok(record)
    }

    async fn query_by_user(&self, user: &str) -> Result<Option<LocationRecord>> {
        match self.latest.find_one(doc! { "user": user }).await? {
            Some(doc) => Ok(Some(record_from_document(&doc)?)),
            None => Ok(None),
        }
    }

    async fn query_all(&self) -> Result<Vec<LocationRecord>> {
        let options = FindOptions::builder().sort(doc! { "user": 1 }).build();

        let mut cursor = self.latest.find(doc! {}).with_options(options).await?;

        let mut records = Vec::new();
        while cursor.advance().await? {
            records.push(record_from_document(&cursor.deserialize_current()?)?);
        }
        Ok(records)
    }
}
