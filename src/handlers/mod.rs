//! Inbound request handlers.

pub mod rest;
