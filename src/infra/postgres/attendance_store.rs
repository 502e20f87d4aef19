//! PostgreSQL attendance store
//!
//! # Atomicity
//!
//! `record_attendance` runs identity resolution, the same-day lookup and the
//! insert inside one transaction:
//! ```sql
//! BEGIN;
//! SELECT full_name FROM people WHERE card_uid = $1;
//! SELECT id FROM attendance_logs WHERE card_uid = $1 AND event_date = $2;
//! INSERT INTO attendance_logs (...) VALUES (...)
//!     ON CONFLICT (card_uid, event_date) DO NOTHING RETURNING id;
//! COMMIT;
//! ```
//!
//! Two concurrent submissions for the same card can both pass the lookup. The
//! second insert then blocks on the unique index until the first commits and
//! returns no row, which is reported as `AlreadyRecorded`. The unique key is
//! the authoritative tiebreak; no row is ever duplicated.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::instrument;

use crate::domain::{AttendanceEvent, CardUid, HistoryEntry, HistoryQuery, Person};
use crate::infra::rows::{HistoryRow, PersonRow};
use crate::infra::traits::normalize_name;
use crate::infra::{AttendanceError, AttendanceStore, RecordResult, Result};

/// PostgreSQL-based attendance store
pub struct PgAttendanceStore {
    pool: PgPool,
}

impl PgAttendanceStore {
    /// Create a new PostgreSQL attendance store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect, optionally applying migrations
    pub async fn connect(url: &str, max_connections: u32, migrate: bool) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        if migrate {
            crate::migrations::run_postgres(&pool).await?;
        }

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AttendanceStore for PgAttendanceStore {
    async fn find_person(&self, card_uid: &CardUid) -> Result<Option<Person>> {
        let row = sqlx::query_as::<_, PersonRow>(
            "SELECT card_uid, full_name, created_at FROM people WHERE card_uid = $1",
        )
        .bind(card_uid.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Person::try_from).transpose()
    }

    async fn register_person(&self, card_uid: &CardUid, full_name: &str) -> Result<Person> {
        let full_name = normalize_name(full_name)?;

        let row = sqlx::query_as::<_, PersonRow>(
            r#"
            INSERT INTO people (card_uid, full_name, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (card_uid) DO NOTHING
            RETURNING card_uid, full_name, created_at
            "#,
        )
        .bind(card_uid.as_str())
        .bind(&full_name)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Person::try_from(row),
            None => Err(AttendanceError::PersonExists(card_uid.to_string())),
        }
    }

    async fn remove_person(&self, card_uid: &CardUid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // Lock the person row so no event can be attached between check and delete.
        let person: Option<(String,)> =
            sqlx::query_as("SELECT card_uid FROM people WHERE card_uid = $1 FOR UPDATE")
                .bind(card_uid.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        if person.is_none() {
            return Ok(false);
        }

        let (events,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM attendance_logs WHERE card_uid = $1")
                .bind(card_uid.as_str())
                .fetch_one(&mut *tx)
                .await?;
        if events > 0 {
            return Err(AttendanceError::PersonInUse(card_uid.to_string()));
        }

        let result = sqlx::query("DELETE FROM people WHERE card_uid = $1")
            .bind(card_uid.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_people(&self) -> Result<Vec<Person>> {
        let rows = sqlx::query_as::<_, PersonRow>(
            "SELECT card_uid, full_name, created_at FROM people ORDER BY created_at DESC, card_uid ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Person::try_from).collect()
    }

    #[instrument(skip(self), fields(card_uid = %card_uid))]
    async fn record_attendance(
        &self,
        card_uid: &CardUid,
        at: NaiveDateTime,
    ) -> Result<RecordResult> {
        let event_date = at.date();
        let mut tx = self.pool.begin().await?;

        let person: Option<(String,)> =
            sqlx::query_as("SELECT full_name FROM people WHERE card_uid = $1")
                .bind(card_uid.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        let Some((full_name,)) = person else {
            return Ok(RecordResult::UnknownCard);
        };

        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM attendance_logs WHERE card_uid = $1 AND event_date = $2",
        )
        .bind(card_uid.as_str())
        .bind(event_date)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_some() {
            return Ok(RecordResult::AlreadyRecorded { full_name });
        }

        let inserted: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO attendance_logs (card_uid, entry_time, event_date)
            VALUES ($1, $2, $3)
            ON CONFLICT (card_uid, event_date) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(card_uid.as_str())
        .bind(at)
        .bind(event_date)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(match inserted {
            Some((id,)) => RecordResult::Recorded {
                event: AttendanceEvent {
                    id,
                    card_uid: card_uid.clone(),
                    entry_time: at,
                    event_date,
                },
                full_name,
            },
            None => RecordResult::AlreadyRecorded { full_name },
        })
    }

    async fn history(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT a.id, p.full_name, a.card_uid, a.entry_time
            FROM attendance_logs a
            JOIN people p ON a.card_uid = p.card_uid
            WHERE ($1::date IS NULL OR a.event_date = $1)
            ORDER BY a.entry_time DESC, a.id DESC
            LIMIT $2
            "#,
        )
        .bind(query.date)
        .bind(query.effective_limit() as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HistoryEntry::try_from).collect()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
