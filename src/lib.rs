//! Whereabouts - location report store
//!
//! Records geographic positions reported by named users and answers
//! "where is this user now / where have they been" and "where is everyone
//! now". Two retention models are supported:
//!
//! - **history**: every report is appended and kept
//! - **latest**: one row per user, replaced on each report
//!
//! The model and backend are selected once at startup; see [`storage`].

pub mod config;
pub mod handlers;
pub mod record;
pub mod services;
pub mod storage;
pub mod utils;
