//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Append-only location history table schema.
///
/// `seq` is the write-order position used for "latest per user".
#[derive(Iden)]
pub enum LocationHistory {
    Table,
    #[iden = "seq"]
    Seq,
    #[iden = "user"]
    User,
    #[iden = "longitude"]
    Longitude,
    #[iden = "latitude"]
    Latitude,
    #[iden = "timestamp"]
    Timestamp,
}

/// Latest-position table schema. One row per user.
#[derive(Iden)]
pub enum LatestLocations {
    Table,
    #[iden = "user"]
    User,
    #[iden = "longitude"]
    Longitude,
    #[iden = "latitude"]
    Latitude,
    #[iden = "timestamp"]
    Timestamp,
}
