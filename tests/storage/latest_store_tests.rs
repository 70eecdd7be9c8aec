//! LatestStore interface tests.
//!
//! These tests verify the contract of the LatestStore trait.
//! Each storage implementation should run these tests.

#![allow(dead_code)]

use futures::future::join_all;
use whereabouts::record::LocationReport;
use whereabouts::storage::LatestStore;

fn report(user: &str, longitude: f64, latitude: f64) -> LocationReport {
    LocationReport::new(user, longitude, latitude).expect("valid report")
}

// =============================================================================
// LatestStore::query_by_user tests
// =============================================================================

pub async fn test_query_unknown_user_is_none<S: LatestStore>(store: &S) {
    let row = store
        .query_by_user("test_latest_nobody")
        .await
        .expect("query should succeed");
    assert!(row.is_none(), "unknown user has no row");
}

// =============================================================================
// LatestStore::upsert tests
// =============================================================================

pub async fn test_upsert_inserts<S: LatestStore>(store: &S) {
    let record = store
        .upsert(report("test_latest_insert", 10.0, 20.0))
        .await
        .expect("upsert should succeed");

    assert_eq!(record.user, "test_latest_insert");
    let row = store
        .query_by_user("test_latest_insert")
        .await
        .unwrap()
        .expect("row should exist");
    assert_eq!(row, record);
}

pub async fn test_upsert_replaces<S: LatestStore>(store: &S) {
    let first = store.upsert(report("test_latest_replace", 1.0, 1.0)).await.unwrap();
    let second = store.upsert(report("test_latest_replace", 2.0, 3.0)).await.unwrap();
    assert!(second.timestamp >= first.timestamp);

    let row = store
        .query_by_user("test_latest_replace")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.longitude, 2.0);
    assert_eq!(row.latitude, 3.0);

    let all = store.query_all().await.unwrap();
    let rows = all.iter().filter(|r| r.user == "test_latest_replace").count();
    assert_eq!(rows, 1, "one row per user");
}

pub async fn test_upsert_preserves_exact_coordinates<S: LatestStore>(store: &S) {
    let longitude = -0.127_758_000_000_000_01;
    let latitude = 51.507_350_999_999_99;

    store
        .upsert(report("test_latest_exact", longitude, latitude))
        .await
        .unwrap();

    let row = store
        .query_by_user("test_latest_exact")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.longitude.to_bits(), longitude.to_bits());
    assert_eq!(row.latitude.to_bits(), latitude.to_bits());
}

// =============================================================================
// LatestStore::query_all tests
// =============================================================================

pub async fn test_query_all_sorted_by_user<S: LatestStore>(store: &S) {
    store.upsert(report("test_latest_zed", 1.0, 1.0)).await.unwrap();
    store.upsert(report("test_latest_amy", 2.0, 2.0)).await.unwrap();

    let all = store.query_all().await.unwrap();
    let users: Vec<&str> = all.iter().map(|r| r.user.as_str()).collect();

    let mut sorted = users.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(users, sorted, "sorted by user with no duplicates");

    let amy = users.iter().position(|u| *u == "test_latest_amy").unwrap();
    let zed = users.iter().position(|u| *u == "test_latest_zed").unwrap();
    assert!(amy < zed);
}

// =============================================================================
// Concurrency tests
// =============================================================================

pub async fn test_concurrent_upserts_never_mix_fields<S: LatestStore>(store: &S) {
    const WRITERS: usize = 30;

    let writes = (0..WRITERS).map(move |i| {
        let value = i as f64;
        async move { store.upsert(report("test_latest_race", value, value)).await }
    });
    for result in join_all(writes).await {
        result.expect("concurrent upsert should succeed");
    }

    let row = store
        .query_by_user("test_latest_race")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.longitude, row.latitude, "fields come from one report");
    assert!((0..WRITERS).any(|i| i as f64 == row.longitude));

    let all = store.query_all().await.unwrap();
    assert_eq!(
        all.iter().filter(|r| r.user == "test_latest_race").count(),
        1
    );
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all LatestStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_latest_store_tests {
    ($store:expr) => {
        use $crate::storage::latest_store_tests::*;

        // query_by_user tests
        test_query_unknown_user_is_none($store).await;
        println!("  test_query_unknown_user_is_none: PASSED");

        // upsert tests
        test_upsert_inserts($store).await;
        println!("  test_upsert_inserts: PASSED");

        test_upsert_replaces($store).await;
        println!("  test_upsert_replaces: PASSED");

        test_upsert_preserves_exact_coordinates($store).await;
        println!("  test_upsert_preserves_exact_coordinates: PASSED");

        // query_all tests
        test_query_all_sorted_by_user($store).await;
        println!("  test_query_all_sorted_by_user: PASSED");

        // concurrency tests
        test_concurrent_upserts_never_mix_fields($store).await;
        println!("  test_concurrent_upserts_never_mix_fields: PASSED");
    };
}
