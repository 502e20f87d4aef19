//! PostgreSQL implementations for the production attendance store

mod attendance_store;

pub use attendance_store::*;
