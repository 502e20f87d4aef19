//! Error types for card attendance infrastructure

use thiserror::Error;

use crate::domain::CardUidError;

/// Errors that can occur in the attendance infrastructure
///
/// Policy rejections (too early, unknown card, duplicate) are not errors;
/// they are reported as [`crate::domain::ScanOutcome`] values.
#[derive(Error, Debug)]
pub enum AttendanceError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Card uid failed validation
    #[error("invalid card uid: {0}")]
    InvalidCardUid(#[from] CardUidError),

    /// Person already registered for this card
    #[error("person already registered for card {0}")]
    PersonExists(String),

    /// Person has attendance history and cannot be removed
    #[error("person {0} has attendance history")]
    PersonInUse(String),

    /// Invalid display name
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for attendance operations
pub type Result<T> = std::result::Result<T, AttendanceError>;
