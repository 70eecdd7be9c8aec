//! Mock storage implementations for testing.
//!
//! In-memory stores that follow the same contracts as the real backends,
//! with switches to make reads or writes fail.

mod history_store;
mod latest_store;


pub use history_store::MockHistoryStore;
pub use latest_store::MockLatestStore;

use super::StorageError;

/// Error returned when a failure switch is on.
fn injected_failure(operation: &str) -> StorageError {
    StorageError::Io(std::io::Error::other(format!("injected {operation} failure")))
}
