//! API layer for card attendance
//!
//! REST endpoints for scan ingestion and the read-only history export.

pub mod error;
pub mod handlers;
mod rest;
pub mod types;

pub use rest::*;
