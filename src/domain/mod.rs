//! Domain models for card attendance
//!
//! Identity, attendance records and the policy outcomes shared by the
//! server and the edge client.

mod attendance;
mod types;

pub use attendance::*;
pub use types::*;
