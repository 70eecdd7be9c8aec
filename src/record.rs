//! Location record codec.
//!
//! Defines the shape of a position report as callers submit it, the stored
//! record (report plus write-time timestamp), and the persisted JSON layout:
//!
//! ```text
//! [
//!   { "user": "alice", "longitude": 10.0, "latitude": 20.0,
//!     "timestamp": "2024-05-01T12:00:00.000Z" },
//!   ...
//! ]
//! ```
//!
//! Decoding a whole persisted collection never fails. Anything that is not a
//! JSON array of records decodes to an empty collection, so a store whose
//! backing file was corrupted starts empty and is repopulated by new writes.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Reasons a report is rejected before it reaches a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    #[error("user (string) is required")]
    MissingUser,

    #[error("longitude and latitude must be numbers")]
    InvalidCoordinates,
}

/// A validated position report. The timestamp is assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationReport {
    pub user: String,
    pub longitude: f64,
    pub latitude: f64,
}

impl LocationReport {
    /// Build a report, trimming the user identifier.
    ///
    /// No range check is applied to the coordinates; any finite number is
    /// accepted.
    pub fn new(user: &str, longitude: f64, latitude: f64) -> Result<Self, ReportError> {
        let user = user.trim();
        if user.is_empty() {
            return Err(ReportError::MissingUser);
        }
        if !longitude.is_finite() || !latitude.is_finite() {
            return Err(ReportError::InvalidCoordinates);
        }
        Ok(Self {
            user: user.to_string(),
            longitude,
            latitude,
        })
    }

    /// Validate a JSON request body of the form
    /// `{"user": string, "longitude": number, "latitude": number}`.
    ///
    /// The user is checked before the coordinates.
    pub fn from_json(body: &Value) -> Result<Self, ReportError> {
        let user = body
            .get("user")
            .and_then(Value::as_str)
            .ok_or(ReportError::MissingUser)?;
        if user.trim().is_empty() {
            return Err(ReportError::MissingUser);
        }

        let longitude = body.get("longitude").and_then(Value::as_f64);
        let latitude = body.get("latitude").and_then(Value::as_f64);
        match (longitude, latitude) {
            (Some(longitude), Some(latitude)) => Self::new(user, longitude, latitude),
            _ => Err(ReportError::InvalidCoordinates),
        }
    }

    /// Attach the write-time timestamp.
    pub fn stamp(self, timestamp: DateTime<Utc>) -> LocationRecord {
        LocationRecord {
            user: self.user,
            longitude: self.longitude,
            latitude: self.latitude,
            timestamp,
        }
    }
}

/// A stored location record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub user: String,
    pub longitude: f64,
    pub latitude: f64,
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
}

/// Projection of a record used by the "everyone's latest position" view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserPosition {
    pub user: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
}

impl From<LocationRecord> for UserPosition {
    fn from(record: LocationRecord) -> Self {
        Self {
            user: record.user,
            latitude: record.latitude,
            longitude: record.longitude,
            timestamp: record.timestamp,
        }
    }
}

/// Format a timestamp as an ISO-8601 instant with millisecond precision,
/// e.g. `2024-05-01T12:00:00.000Z`.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 / ISO-8601 instant into UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|ts| ts.with_timezone(&Utc))
}

/// Serde adapter for [`format_timestamp`] / [`parse_timestamp`].
mod iso8601 {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(de::Error::custom)
    }
}

/// Encode a collection in the persisted layout (pretty-printed JSON array).
pub fn encode_collection(records: &[LocationRecord]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(records)
}

/// Decode a persisted collection.
///
/// Tolerance policy: malformed JSON or a non-array top level yields an empty
/// collection, and individual entries that do not decode as records are
/// skipped. Both cases are logged, never returned as errors.
pub fn decode_collection(raw: &[u8]) -> Vec<LocationRecord> {
    if raw.trim_ascii().is_empty() {
        return Vec::new();
    }

    let parsed: Value = match serde_json::from_slice(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "persisted locations are not valid JSON, starting empty");
            return Vec::new();
        }
    };

    let Value::Array(items) = parsed else {
        warn!("persisted locations are not a JSON array, starting empty");
        return Vec::new();
    };

    let total = items.len();
    let records: Vec<LocationRecord> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();

    if records.len() < total {
        warn!(
            skipped = total - records.len(),
            kept = records.len(),
            "skipped malformed persisted location entries"
        );
    }

    records
}

/// Write-time clock that never goes backwards.
///
/// Timestamps are truncated to milliseconds so a record compares equal to
/// itself after a round trip through any backend.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next write timestamp: wall-clock now, or the previous stamp if the
    /// wall clock has stepped back.
    pub fn now(&self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(3);
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let stamped = match *last {
            Some(previous) if previous > now => previous,
            _ => now,
        };
        *last = Some(stamped);
        stamped
    }

    /// Seed the clock with a timestamp already persisted by the store.
    pub fn observe(&self, timestamp: DateTime<Utc>) {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        match *last {
            Some(previous) if previous >= timestamp => {}
            _ => *last = Some(timestamp),
        }
    }
}
