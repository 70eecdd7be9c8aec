//! SQLite LatestStore implementation.

use async_trait::async_trait;
use sea_query::{Expr, OnConflict, Order, Query, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::debug;

use super::record_from_row;
use crate::record::{format_timestamp, LocationRecord, LocationReport, MonotonicClock};
use crate::storage::schema::LatestLocations;
use crate::storage::{LatestStore, Result};

/// SQLite implementation of LatestStore.
///
/// `user` is the primary key; a report is one
/// `INSERT ... ON CONFLICT(user) DO UPDATE` statement.
pub struct SqliteLatestStore {
    pool: SqlitePool,
    clock: MonotonicClock,
    /// Keeps stamp order equal to commit order.
    write_lock: Mutex<()>,
}

impl SqliteLatestStore {
    /// Create a new SQLite latest-position store.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            clock: MonotonicClock::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create the table if it doesn't exist.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS latest_locations (
                user TEXT PRIMARY KEY,
                longitude REAL NOT NULL,
                latitude REAL NOT NULL,
                timestamp TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl LatestStore for SqliteLatestStore {
    async fn upsert(&self, report: LocationReport) -> Result<LocationRecord> {
        let _guard = self.write_lock.lock().await;
        let record = report.stamp(self.clock.now());

        let (sql, values) = Query::insert()
            .into_table(LatestLocations::Table)
            .columns([
                LatestLocations::User,
                LatestLocations::Longitude,
                LatestLocations::Latitude,
                LatestLocations::Timestamp,
            ])
            .values_panic([
                record.user.as_str().into(),
                record.longitude.into(),
                record.latitude.into(),
                format_timestamp(&record.timestamp).into(),
            ])
            .on_conflict(
                OnConflict::column(LatestLocations::User)
                    .update_columns([
                        LatestLocations::Longitude,
                        LatestLocations::Latitude,
                        LatestLocations::Timestamp,
                    ])
                    .to_owned(),
            )
            .build_sqlx(SqliteQueryBuilder);

        sqlx::query_with(&sql, values).execute(&self.pool).await?;

        debug!(user = %record.user, "upserted latest location");
        Ok(record)
    }

    async fn query_by_user(&self, user: &str) -> Result<Option<LocationRecord>> {
        let (sql, values) = Query::select()
            .columns([
                LatestLocations::User,
                LatestLocations::Longitude,
                LatestLocations::Latitude,
                LatestLocations::Timestamp,
            ])
            .from(LatestLocations::Table)
            .and_where(Expr::col(LatestLocations::User).eq(user))
            .build_sqlx(SqliteQueryBuilder);

        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn query_all(&self) -> Result<Vec<LocationRecord>> {
        let (sql, values) = Query::select()
            .columns([
                LatestLocations::User,
                LatestLocations::Longitude,
                LatestLocations::Latitude,
                LatestLocations::Timestamp,
            ])
            .from(LatestLocations::Table)
            .order_by(LatestLocations::User, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);

        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }
}
