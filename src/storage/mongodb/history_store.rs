//! MongoDB HistoryStore implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::options::{AggregateOptions, FindOptions};
use mongodb::{Client, Collection, IndexModel};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::record::{LocationRecord, LocationReport, MonotonicClock};
use crate::storage::{HistoryStore, Result};

use super::{record_from_document, to_bson_datetime, LOCATIONS_COLLECTION};

/// MongoDB implementation of HistoryStore.
///
/// Insert-only. Sequence order is `(timestamp, _id)`: the write clock never
/// goes backwards and appends from this process are serialized, so the two
/// agree.
pub struct MongoHistoryStore {
    locations: Collection<Document>,
    clock: MonotonicClock,
    write_lock: Mutex<()>,
}

impl MongoHistoryStore {
    /// Create a new MongoDB history store.
    pub async fn new(client: &Client, database_name: &str) -> Result<Self> {
        let database = client.database(database_name);
        let locations = database.collection(LOCATIONS_COLLECTION);

        let store = Self {
            locations,
            clock: MonotonicClock::new(),
            write_lock: Mutex::new(()),
        };
        store.init().await?;

        Ok(store)
    }

    /// Initialize indexes and seed the write clock.
    async fn init(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "user": 1, "timestamp": 1 })
            .build();
        self.locations.create_index(index).await?;

        let options = FindOptions::builder()
            .sort(doc! { "timestamp": -1, "_id": -1 })
            .limit(1)
            .build();
        let mut cursor = self.locations.find(doc! {}).with_options(options).await?;
        if cursor.advance().await? {
            match record_from_document(&cursor.deserialize_current()?) {
                Ok(newest) => self.clock.observe(newest.timestamp),
                Err(e) => warn!(error = %e, "skipping clock seed from malformed document"),
            }
        }

        Ok(())
    }
}

#[async_trait]
impl HistoryStore for MongoHistoryStore {
    async fn append(&self, report: LocationReport) -> Result<LocationRecord> {
        let _guard = self.write_lock.lock().await;
        let record = report.stamp(self.clock.now());

        let doc = doc! {
            "user": record.user.as_str(),
            "longitude": record.longitude,
            "latitude": record.latitude,
            "timestamp": to_bson_datetime(&record.timestamp),
        };
        self.locations.insert_one(doc).await?;

        debug!(user = %record.user, "appended location");
        Ok(record)
    }

    async fn query_by_user(&self, user: &str) -> Result<Vec<LocationRecord>> {
        let options = FindOptions::builder()
            .sort(doc! { "timestamp": 1, "_id": 1 })
            .build();

        let mut cursor = self
            .locations
            .find(doc! { "user": user })
            .with_options(options)
            .await?;

        let mut records = Vec::new();
        while cursor.advance().await? {
            records.push(record_from_document(&cursor.deserialize_current()?)?);
        }
        Ok(records)
    }

    async fn query_latest_per_user(&self) -> Result<BTreeMap<String, LocationRecord>> {
        let pipeline = vec![
            doc! { "$sort": { "timestamp": 1, "_id": 1 } },
            doc! { "$group": { "_id": "$user", "doc": { "$last": "$$ROOT" } } },
            doc! { "$replaceRoot": { "newRoot": "$doc" } },
            doc! { "$sort": { "user": 1 } },
        ];

        // The full-collection sort can exceed the in-memory sort limit
        let options = AggregateOptions::builder().allow_disk_use(true).build();
        let mut cursor = self
            .locations
            .aggregate(pipeline)
            .with_options(options)
            .await?;

        let mut latest = BTreeMap::new();
        while cursor.advance().await? {
            let record = record_from_document(&cursor.deserialize_current()?)?;
            latest.insert(record.user.clone(), record);
        }
        Ok(latest)
    }
}
