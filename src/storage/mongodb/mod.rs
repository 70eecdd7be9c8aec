//! MongoDB implementations of storage interfaces.

mod history_store;
mod latest_store;

pub use history_store::MongoHistoryStore;
pub use latest_store::MongoLatestStore;

use chrono::{DateTime, Utc};
use mongodb::bson::{self, Bson, Document};

use crate::record::{parse_timestamp, LocationRecord};
use crate::storage::{Result, StorageError};

/// Collection names.
pub(crate) const LOCATIONS_COLLECTION: &str = "locations";
pub(crate) const LATEST_COLLECTION: &str = "latest_locations";

/// Server error code for a unique index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref write_err))
            if write_err.code == DUPLICATE_KEY_CODE
    )
}

fn to_bson_datetime(timestamp: &DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(timestamp.timestamp_millis())
}

fn coordinate(doc: &Document, field: &str) -> Result<f64> {
    match doc.get(field) {
        Some(Bson::Double(v)) => Ok(*v),
        Some(Bson::Int32(v)) => Ok(f64::from(*v)),
        Some(Bson::Int64(v)) => Ok(*v as f64),
        other => Err(StorageError::InvalidRecord(format!(
            "{field} is not a number: {other:?}"
        ))),
    }
}

/// Decode a document carrying `user`, `longitude`, `latitude`, `timestamp`.
///
/// Timestamps are normally BSON dates; ISO-8601 strings written by other
/// tools are accepted too.
fn record_from_document(doc: &Document) -> Result<LocationRecord> {
    let user = doc
        .get_str("user")
        .map_err(|e| StorageError::InvalidRecord(format!("user: {e}")))?
        .to_string();

    let timestamp = match doc.get("timestamp") {
        Some(Bson::DateTime(dt)) => DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis())
            .ok_or_else(|| StorageError::InvalidRecord(format!("timestamp out of range: {dt}")))?,
        Some(Bson::String(raw)) => parse_timestamp(raw)
            .map_err(|e| StorageError::InvalidRecord(format!("timestamp {raw:?}: {e}")))?,
        other => {
            return Err(StorageError::InvalidRecord(format!(
                "timestamp missing or malformed: {other:?}"
            )))
        }
    };

    Ok(LocationRecord {
        user,
        longitude: coordinate(doc, "longitude")?,
        latitude: coordinate(doc, "latitude")?,
        timestamp,
    })
}
