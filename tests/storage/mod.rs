//! Shared storage integration tests.
//!
//! Tests the HistoryStore and LatestStore interfaces against all implementations.
//! Each implementation module imports these test functions and runs them.

pub mod history_store_tests;
pub mod latest_store_tests;
