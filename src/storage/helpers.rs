//! Shared storage helper functions.

use std::collections::BTreeMap;

use crate::record::LocationRecord;

/// Fold a history (in sequence order) into the latest record per user.
///
/// Each record overwrites its user's slot, so the survivor is the one with
/// the greatest sequence position regardless of its timestamp.
pub fn latest_per_user<I>(records: I) -> BTreeMap<String, LocationRecord>
where
    I: IntoIterator<Item = LocationRecord>,
{
    let mut latest = BTreeMap::new();
    for record in records {
        latest.insert(record.user.clone(), record);
    }
    latest
}
