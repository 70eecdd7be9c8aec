//! HistoryStore interface tests.
//!
//! These tests verify the contract of the HistoryStore trait.
//! Each storage implementation should run these tests.
//!
//! User names are prefixed with `test_` and unique per test, so the suite
//! can run against a shared database.

#![allow(dead_code)]

use futures::future::join_all;
use whereabouts::record::LocationReport;
use whereabouts::storage::HistoryStore;

fn report(user: &str, longitude: f64, latitude: f64) -> LocationReport {
    LocationReport::new(user, longitude, latitude).expect("valid report")
}

// =============================================================================
// HistoryStore::append tests
// =============================================================================

pub async fn test_append_returns_stamped_record<S: HistoryStore>(store: &S) {
    let before = chrono::Utc::now() - chrono::Duration::seconds(1);

    let record = store
        .append(report("test_hist_stamp", 10.0, 20.0))
        .await
        .expect("append should succeed");

    assert_eq!(record.user, "test_hist_stamp");
    assert_eq!(record.longitude, 10.0);
    assert_eq!(record.latitude, 20.0);
    assert!(record.timestamp >= before, "timestamp is assigned at write time");
}

pub async fn test_append_preserves_exact_coordinates<S: HistoryStore>(store: &S) {
    let longitude = 151.209_295_999_999_99;
    let latitude = 0.1 + 0.2;

    store
        .append(report("test_hist_exact", longitude, latitude))
        .await
        .unwrap();

    let history = store.query_by_user("test_hist_exact").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].longitude.to_bits(), longitude.to_bits());
    assert_eq!(history[0].latitude.to_bits(), latitude.to_bits());
}

// =============================================================================
// HistoryStore::query_by_user tests
// =============================================================================

pub async fn test_query_unknown_user_is_empty<S: HistoryStore>(store: &S) {
    let history = store
        .query_by_user("test_hist_nobody")
        .await
        .expect("query should succeed");
    assert!(history.is_empty(), "unknown user has no history");
}

pub async fn test_query_by_user_in_write_order<S: HistoryStore>(store: &S) {
    let first = store.append(report("test_hist_order", 1.0, 1.0)).await.unwrap();
    store.append(report("test_hist_other", 5.0, 5.0)).await.unwrap();
    let second = store.append(report("test_hist_order", 2.0, 2.0)).await.unwrap();
    let third = store.append(report("test_hist_order", 3.0, 3.0)).await.unwrap();

    let history = store.query_by_user("test_hist_order").await.unwrap();
    assert_eq!(history, vec![first, second, third]);
    assert!(
        history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp),
        "timestamps never decrease"
    );
}

pub async fn test_query_is_exact_match<S: HistoryStore>(store: &S) {
    store.append(report("test_hist_Case", 1.0, 1.0)).await.unwrap();

    assert!(store.query_by_user("test_hist_case").await.unwrap().is_empty());
    assert_eq!(store.query_by_user("test_hist_Case").await.unwrap().len(), 1);
}

// =============================================================================
// HistoryStore::query_latest_per_user tests
// =============================================================================

pub async fn test_latest_per_user<S: HistoryStore>(store: &S) {
    store.append(report("test_hist_zed", 1.0, 1.0)).await.unwrap();
    let amy = store.append(report("test_hist_amy", 2.0, 2.0)).await.unwrap();
    let zed = store.append(report("test_hist_zed", 3.0, 4.0)).await.unwrap();

    let latest = store.query_latest_per_user().await.unwrap();
    assert_eq!(latest.get("test_hist_amy"), Some(&amy));
    assert_eq!(latest.get("test_hist_zed"), Some(&zed));

    let users: Vec<&String> = latest.keys().collect();
    let mut sorted = users.clone();
    sorted.sort();
    assert_eq!(users, sorted, "users iterate in ascending order");
}

// =============================================================================
// Concurrency tests
// =============================================================================

pub async fn test_concurrent_appends_lose_nothing<S: HistoryStore>(store: &S) {
    const USERS: usize = 4;
    const PER_USER: usize = 10;

    let writes = (0..USERS * PER_USER).map(move |i| {
        let user = format!("test_hist_conc_{}", i % USERS);
        async move { store.append(report(&user, i as f64, 0.0)).await }
    });
    for result in join_all(writes).await {
        result.expect("concurrent append should succeed");
    }

    for u in 0..USERS {
        let user = format!("test_hist_conc_{u}");
        let history = store.query_by_user(&user).await.unwrap();
        assert_eq!(history.len(), PER_USER, "{user} lost or duplicated records");

        let mut seen: Vec<usize> = history.iter().map(|r| r.longitude as usize).collect();
        seen.sort_unstable();
        let expected: Vec<usize> = (0..USERS * PER_USER).filter(|i| i % USERS == u).collect();
        assert_eq!(seen, expected, "{user} has exactly its own reports");
    }

    let latest = store.query_latest_per_user().await.unwrap();
    for u in 0..USERS {
        assert!(latest.contains_key(&format!("test_hist_conc_{u}")));
    }
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all HistoryStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_history_store_tests {
    ($store:expr) => {
        use $crate::storage::history_store_tests::*;

        // append tests
        test_append_returns_stamped_record($store).await;
        println!("  test_append_returns_stamped_record: PASSED");

        test_append_preserves_exact_coordinates($store).await;
        println!("  test_append_preserves_exact_coordinates: PASSED");

        // query_by_user tests
        test_query_unknown_user_is_empty($store).await;
        println!("  test_query_unknown_user_is_empty: PASSED");

        test_query_by_user_in_write_order($store).await;
        println!("  test_query_by_user_in_write_order: PASSED");

        test_query_is_exact_match($store).await;
        println!("  test_query_is_exact_match: PASSED");

        // query_latest_per_user tests
        test_latest_per_user($store).await;
        println!("  test_latest_per_user: PASSED");

        // concurrency tests
        test_concurrent_appends_lose_nothing($store).await;
        println!("  test_concurrent_appends_lose_nothing: PASSED");
    };
}
