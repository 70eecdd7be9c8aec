//! Services layered over the storage backends.

pub mod query;

pub use query::{LocationError, QueryService, UserTrack};
