//! SQLite queue for scans captured on the edge device
//!
//! Every detected scan is appended here before any network I/O, and a row is
//! removed only once the server has adjudicated it. The file is opened with a
//! WAL journal and `synchronous = FULL` so an acknowledged enqueue survives a
//! crash or power loss.
//!
//! Iteration order is insertion order (`id ASC`), so replays after an outage
//! reach the server oldest first.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::FromRow;
use tracing::debug;

use crate::domain::{CardUid, PendingScan};
use crate::infra::{AttendanceError, Result};

/// Durable FIFO of scans whose server-side fate is unknown.
///
/// Cloning shares the underlying pool. Callers keep a single writer (the
/// capture loop); the queue itself does not arbitrate concurrent drains.
#[derive(Clone)]
pub struct LocalQueue {
    pool: SqlitePool,
}

impl LocalQueue {
    /// Create a queue over an existing pool (schema must already be migrated)
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the queue file and apply migrations
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let queue = Self::new(pool);
        queue.initialize().await?;
        Ok(queue)
    }

    /// Non-durable queue for tests and dry runs
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let queue = Self::new(pool);
        queue.initialize().await?;
        Ok(queue)
    }

    /// Initialize the database schema
    pub async fn initialize(&self) -> Result<()> {
        crate::migrations::run_queue(&self.pool).await?;
        Ok(())
    }

    /// Append a scan; returns its insertion-ordered id
    pub async fn enqueue(&self, card_uid: &CardUid, captured_at: DateTime<Utc>) -> Result<i64> {
        let result = sqlx::query("INSERT INTO pending_scans (card_uid, captured_at) VALUES (?, ?)")
            .bind(card_uid.as_str())
            .bind(captured_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        let id = result.last_insert_rowid();
        debug!(id, card_uid = %card_uid, "scan enqueued");
        Ok(id)
    }

    /// Oldest pending scans, up to `limit`
    pub async fn peek_oldest_batch(&self, limit: u32) -> Result<Vec<PendingScan>> {
        let rows = sqlx::query_as::<_, PendingScanRow>(
            r#"
            SELECT id, card_uid, captured_at
            FROM pending_scans
            ORDER BY id ASC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PendingScan::try_from).collect()
    }

    /// Remove an adjudicated scan. Returns `false` if it was already gone.
    pub async fn remove(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pending_scans WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Whether a scan is still pending
    pub async fn contains(&self, id: i64) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM pending_scans WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Number of pending scans
    pub async fn count(&self) -> Result<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pending_scans")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 as u64)
    }

    /// Flush and release the database file
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Raw row from pending_scans table
#[derive(Debug, FromRow)]
struct PendingScanRow {
    id: i64,
    card_uid: String,
    captured_at: String,
}

impl TryFrom<PendingScanRow> for PendingScan {
    type Error = AttendanceError;

    fn try_from(row: PendingScanRow) -> Result<Self> {
        let captured_at = DateTime::parse_from_rfc3339(&row.captured_at)
            .map_err(|e| AttendanceError::Internal(format!("Invalid captured_at: {}", e)))?
            .with_timezone(&Utc);

        Ok(PendingScan {
            id: row.id,
            card_uid: CardUid::parse(&row.card_uid)?,
            captured_at,
        })
    }
}
