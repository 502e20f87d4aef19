//! Trait definitions for card attendance core services

use async_trait::async_trait;
use chrono::NaiveDateTime;
#[cfg(test)]
use mockall::automock;

use crate::domain::{AttendanceEvent, CardUid, HistoryEntry, HistoryQuery, Person};

use super::Result;

/// Outcome of the atomic identity → dedup → insert unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordResult {
    /// A new event was inserted and committed
    Recorded {
        event: AttendanceEvent,
        full_name: String,
    },
    /// An event for this card and day already exists; nothing was written
    AlreadyRecorded { full_name: String },
    /// No person is registered for the card
    UnknownCard,
}

/// Relational store holding people and their attendance events.
///
/// Invariant: at most one attendance event per (card_uid, calendar day),
/// enforced by a unique key that also breaks ties between concurrent writers.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Look up the person registered for a card
    async fn find_person(&self, card_uid: &CardUid) -> Result<Option<Person>>;

    /// Register a new card holder
    ///
    /// Fails with `PersonExists` if the card is already issued.
    async fn register_person(&self, card_uid: &CardUid, full_name: &str) -> Result<Person>;

    /// Remove a card holder with no attendance history
    ///
    /// Returns `false` if no person was registered for the card.
    async fn remove_person(&self, card_uid: &CardUid) -> Result<bool>;

    /// All registered people, newest first
    async fn list_people(&self) -> Result<Vec<Person>>;

    /// Resolve the card, check for an event on `at`'s calendar day and insert
    /// one if absent, as a single transaction.
    async fn record_attendance(&self, card_uid: &CardUid, at: NaiveDateTime)
        -> Result<RecordResult>;

    /// Read-only history export, newest first
    async fn history(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>>;

    /// Check store connectivity
    async fn ping(&self) -> Result<()>;
}

/// Source of server wall-clock time for policy decisions.
#[cfg_attr(test, automock)]
pub trait Clock: Send + Sync {
    /// Current local date and time
    fn now(&self) -> NaiveDateTime;
}

/// Trim and bound a display name before it reaches the store.
pub(crate) fn normalize_name(full_name: &str) -> Result<String> {
    let name = full_name.trim();
    if name.is_empty() {
        return Err(super::AttendanceError::InvalidName(
            "name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > 200 {
        return Err(super::AttendanceError::InvalidName(
            "name must be at most 200 characters".to_string(),
        ));
    }
    Ok(name.to_string())
}
