//! MongoDB storage integration tests.
//!
//! Run with: cargo test --test storage_mongodb --features mongodb -- --ignored --nocapture
//!
//! Requires: MONGODB_URI env var or MongoDB on localhost:27017

mod storage;

use whereabouts::storage::{MongoHistoryStore, MongoLatestStore};

fn mongodb_uri() -> String {
    std::env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
}

fn mongodb_database() -> String {
    std::env::var("MONGODB_DATABASE").unwrap_or_else(|_| "whereabouts_test".to_string())
}

/// Clean up test data from a specific collection only.
/// Each test cleans only its own collection to avoid interference when running in parallel.
async fn cleanup_collection(client: &mongodb::Client, db_name: &str, collection: &str) {
    let db = client.database(db_name);
    let coll = db.collection::<mongodb::bson::Document>(collection);
    let _ = coll
        .delete_many(mongodb::bson::doc! { "user": { "$regex": "^test_" } })
        .await;
}

#[tokio::test]
#[ignore = "requires running MongoDB instance"]
async fn test_mongodb_history_store() {
    println!("=== MongoDB HistoryStore Tests ===");
    println!("Connecting to: {}", mongodb_uri());

    let client = mongodb::Client::with_uri_str(&mongodb_uri())
        .await
        .expect("Failed to connect to MongoDB");

    let db_name = mongodb_database();
    println!("Using database: {}", db_name);

    cleanup_collection(&client, &db_name, "locations").await;

    let store = MongoHistoryStore::new(&client, &db_name)
        .await
        .expect("Failed to create history store");

    run_history_store_tests!(&store);

    cleanup_collection(&client, &db_name, "locations").await;

    println!("=== All MongoDB HistoryStore tests PASSED ===");
}

#[tokio::test]
#[ignore = "requires running MongoDB instance"]
async fn test_mongodb_latest_store() {
    println!("=== MongoDB LatestStore Tests ===");
    println!("Connecting to: {}", mongodb_uri());

    let client = mongodb::Client::with_uri_str(&mongodb_uri())
        .await
        .expect("Failed to connect to MongoDB");

    let db_name = mongodb_database();
    println!("Using database: {}", db_name);

    cleanup_collection(&client, &db_name, "latest_locations").await;

    let store = MongoLatestStore::new(&client, &db_name)
        .await
        .expect("Failed to create latest store");

    run_latest_store_tests!(&store);

    cleanup_collection(&client, &db_name, "latest_locations").await;

    println!("=== All MongoDB LatestStore tests PASSED ===");
}
