//! SQLite HistoryStore implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;
use tracing::debug;

use super::record_from_row;
use crate::record::{
    format_timestamp, parse_timestamp, LocationRecord, LocationReport, MonotonicClock,
};
use crate::storage::schema::LocationHistory;
use crate::storage::{HistoryStore, Result};

/// SQLite implementation of HistoryStore.
///
/// Each append is one `INSERT`; the autoincrement `seq` column records
/// write order.
pub struct SqliteHistoryStore {
    pool: SqlitePool,
    clock: MonotonicClock,
    /// Keeps stamp order equal to `seq` order.
    write_lock: Mutex<()>,
}

impl SqliteHistoryStore {
    /// Create a new SQLite history store.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            clock: MonotonicClock::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create the table and index if they don't exist, and seed the write
    /// clock from the newest stored record.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS location_history (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                user TEXT NOT NULL,
                longitude REAL NOT NULL,
                latitude REAL NOT NULL,
                timestamp TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_location_history_user ON location_history(user, seq)",
        )
        .execute(&self.pool)
        .await?;

        let (sql, values) = Query::select()
            .column(LocationHistory::Timestamp)
            .from(LocationHistory::Table)
            .order_by(LocationHistory::Seq, Order::Desc)
            .limit(1)
            .build_sqlx(SqliteQueryBuilder);

        if let Some(row) = sqlx::query_with(&sql, values)
            .fetch_optional(&self.pool)
            .await?
        {
            let raw: String = row.try_get("timestamp")?;
            if let Ok(newest) = parse_timestamp(&raw) {
                self.clock.observe(newest);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, report: LocationReport) -> Result<LocationRecord> {
        let _guard = self.write_lock.lock().await;
        let record = report.stamp(self.clock.now());

        let (sql, values) = Query::insert()
            .into_table(LocationHistory::Table)
            .columns([
                LocationHistory::User,
                LocationHistory::Longitude,
                LocationHistory::Latitude,
                LocationHistory::Timestamp,
            ])
            .values_panic([
                record.user.as_str().into(),
                record.longitude.into(),
                record.latitude.into(),
                format_timestamp(&record.timestamp).into(),
            ])
            .build_sqlx(SqliteQueryBuilder);

        sqlx::query_with(&sql, values).execute(&self.pool).await?;

        debug!(user = %record.user, "appended location");
        Ok(record)
    }

    async fn query_by_user(&self, user: &str) -> Result<Vec<LocationRecord>> {
        let (sql, values) = Query::select()
            .columns([
                LocationHistory::User,
                LocationHistory::Longitude,
                LocationHistory::Latitude,
                LocationHistory::Timestamp,
            ])
            .from(LocationHistory::Table)
            .and_where(Expr::col(LocationHistory::User).eq(user))
            .order_by(LocationHistory::Seq, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);

        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn query_latest_per_user(&self) -> Result<BTreeMap<String, LocationRecord>> {
        // Single statement: the row holding each user's highest seq
        let newest_per_user = Query::select()
            .expr(Expr::col(LocationHistory::Seq).max())
            .from(LocationHistory::Table)
            .group_by_col(LocationHistory::User)
            .to_owned();

        let (sql, values) = Query::select()
            .columns([
                LocationHistory::User,
                LocationHistory::Longitude,
                LocationHistory::Latitude,
                LocationHistory::Timestamp,
            ])
            .from(LocationHistory::Table)
            .and_where(Expr::col(LocationHistory::Seq).in_subquery(newest_per_user))
            .order_by(LocationHistory::User, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);

        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;

        let mut latest = BTreeMap::new();
        for row in &rows {
            let record = record_from_row(row)?;
            latest.insert(record.user.clone(), record);
        }
        Ok(latest)
    }
}
