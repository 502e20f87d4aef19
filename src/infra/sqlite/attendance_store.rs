//! SQLite attendance store for single-node deployments
//!
//! SQLite admits one writer at a time, so writes are additionally serialized
//! through an in-process lock; the `(card_uid, event_date)` unique key stays
//! the authoritative dedup tiebreak.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::domain::{AttendanceEvent, CardUid, HistoryEntry, HistoryQuery, Person};
use crate::infra::rows::{HistoryRow, PersonRow};
use crate::infra::traits::normalize_name;
use crate::infra::{AttendanceError, AttendanceStore, RecordResult, Result};

/// SQLite-based attendance store
pub struct SqliteAttendanceStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl SqliteAttendanceStore {
    /// Create a store over an existing pool (schema must already be migrated)
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    /// Open (creating if missing) a database file and apply migrations
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.initialize().await?;
        Ok(store)
    }

    /// Private in-memory database; a single pinned connection keeps it alive
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.initialize().await?;
        Ok(store)
    }

    /// Initialize the database schema
    pub async fn initialize(&self) -> Result<()> {
        crate::migrations::run_sqlite(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl AttendanceStore for SqliteAttendanceStore {
    async fn find_person(&self, card_uid: &CardUid) -> Result<Option<Person>> {
        let row = sqlx::query_as::<_, PersonRow>(
            "SELECT card_uid, full_name, created_at FROM people WHERE card_uid = ?",
        )
        .bind(card_uid.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Person::try_from).transpose()
    }

    async fn register_person(&self, card_uid: &CardUid, full_name: &str) -> Result<Person> {
        let full_name = normalize_name(full_name)?;
        let created_at = Utc::now();

        let _guard = self.write_lock.lock().await;
        let result = sqlx::query(
            r#"
            INSERT INTO people (card_uid, full_name, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT (card_uid) DO NOTHING
            "#,
        )
        .bind(card_uid.as_str())
        .bind(&full_name)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AttendanceError::PersonExists(card_uid.to_string()));
        }

        Ok(Person {
            card_uid: card_uid.clone(),
            full_name,
            created_at,
        })
    }

    async fn remove_person(&self, card_uid: &CardUid) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let (events,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM attendance_logs WHERE card_uid = ?")
                .bind(card_uid.as_str())
                .fetch_one(&mut *tx)
                .await?;
        if events > 0 {
            return Err(AttendanceError::PersonInUse(card_uid.to_string()));
        }

        let result = sqlx::query("DELETE FROM people WHERE card_uid = ?")
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

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let person: Option<(String,)> =
            sqlx::query_as("SELECT full_name FROM people WHERE card_uid = ?")
                .bind(card_uid.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        let Some((full_name,)) = person else {
            return Ok(RecordResult::UnknownCard);
        };

        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM attendance_logs WHERE card_uid = ? AND event_date = ?")
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
            VALUES (?, ?, ?)
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
            WHERE (? IS NULL OR a.event_date = ?)
            ORDER BY a.entry_time DESC, a.id DESC
            LIMIT ?
            "#,
        )
        .bind(query.date)
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
