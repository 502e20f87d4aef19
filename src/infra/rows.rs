//! Raw rows shared by the PostgreSQL and SQLite stores

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::FromRow;

use crate::domain::{CardUid, HistoryEntry, Person};
use crate::infra::{AttendanceError, Result};

/// Raw row from the people table
#[derive(Debug, FromRow)]
pub(crate) struct PersonRow {
    pub card_uid: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PersonRow> for Person {
    type Error = AttendanceError;

    fn try_from(row: PersonRow) -> Result<Self> {
        Ok(Person {
            card_uid: CardUid::parse(&row.card_uid)?,
            full_name: row.full_name,
            created_at: row.created_at,
        })
    }
}

/// Raw row from the attendance history join
#[derive(Debug, FromRow)]
pub(crate) struct HistoryRow {
    pub id: i64,
    pub full_name: String,
    pub card_uid: String,
    pub entry_time: NaiveDateTime,
}

impl TryFrom<HistoryRow> for HistoryEntry {
    type Error = AttendanceError;

    fn try_from(row: HistoryRow) -> Result<Self> {
        Ok(HistoryEntry {
            id: row.id,
            name: row.full_name,
            uid: CardUid::parse(&row.card_uid)?,
            time: row.entry_time,
        })
    }
}
