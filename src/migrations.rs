//! Database migrations.
//!
//! Uses SQLx embedded migrations for the server store (Postgres or SQLite)
//! and for the edge device's local scan queue (SQLite).

use sqlx::{PgPool, SqlitePool};

static POSTGRES_MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("migrations/postgres");
static SQLITE_MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("migrations/sqlite");
static QUEUE_MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("migrations/queue");

pub async fn run_postgres(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    POSTGRES_MIGRATOR.run(pool).await
}

pub async fn run_sqlite(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    SQLITE_MIGRATOR.run(pool).await
}

pub async fn run_queue(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    QUEUE_MIGRATOR.run(pool).await
}
