//! Card Attendance Library
//!
//! Card-scan attendance ingestion: an edge client that captures scans and
//! buffers them durably while offline, and a server that admits them under a
//! time-window policy with per-day duplicate suppression.
//!
//! ## Modules
//!
//! - [`domain`] - Core domain types (card UIDs, people, attendance events, outcomes)
//! - [`infra`] - Stores (PostgreSQL, SQLite), local queue, ingestion policy
//! - [`api`] - REST API routes
//! - [`client`] - Edge capture, transport and sync engine
//! - [`server`] - HTTP server bootstrap

pub mod api;
pub mod client;
pub mod domain;
pub mod infra;
pub mod migrations;
pub mod server;

// Re-export commonly used types
pub use domain::{
    AttendanceEvent, CardUid, HistoryEntry, PendingScan, Person, ScanOutcome, ScanReceipt,
};

pub use infra::{AttendanceError, AttendanceStore, LocalQueue, Result, ScanIngestor};
