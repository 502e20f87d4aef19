//! SQLite implementations
//!
//! - [`LocalQueue`]: the edge device's durable queue of unadjudicated scans
//! - [`SqliteAttendanceStore`]: server store for single-node deployments

mod attendance_store;
mod queue;

pub use attendance_store::*;
pub use queue::*;
