//! Infrastructure layer for card attendance
//!
//! Contains trait definitions and implementations for:
//! - Attendance store (PostgreSQL, SQLite)
//! - Local durable scan queue (SQLite)
//! - Scan ingestion policy (time window, identity, dedup)
//! - Clocks (system, fixed)
//! - Graceful shutdown

mod clock;
mod error;
mod graceful_shutdown;
mod ingest;
pub mod postgres;
mod rows;
pub mod sqlite;
mod traits;

pub use clock::{FixedClock, SystemClock};
pub use error::*;
pub use graceful_shutdown::shutdown_signal;
pub use ingest::{AdmissionPolicy, ScanIngestor};
pub use postgres::PgAttendanceStore;
pub use sqlite::{LocalQueue, SqliteAttendanceStore};
pub use traits::*;
