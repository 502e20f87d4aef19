//! HTTP server bootstrap for the attendance ingestion service.
//!
//! This module wires together:
//! - configuration (read once from the environment, then immutable)
//! - the attendance store (PostgreSQL or SQLite)
//! - the scan ingestor
//! - the Axum router

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use crate::infra::{
    shutdown_signal, AdmissionPolicy, AttendanceStore, Clock, PgAttendanceStore, ScanIngestor,
    SqliteAttendanceStore, SystemClock,
};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Store URL: `postgres://…` for production, `sqlite:…` for single-node.
    pub database_url: String,
    /// Server listen address.
    pub listen_addr: SocketAddr,
    /// Maximum database connections.
    pub max_connections: u32,
    /// Apply embedded migrations on startup.
    pub migrate_on_startup: bool,
    /// Key required in `x-api-key` for the history export; `None` leaves it open.
    pub api_key: Option<String>,
    /// Daily time window.
    pub policy: AdmissionPolicy,
    /// Comma-separated CORS origins, or `*`.
    pub cors_allow_origins: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => postgres_url_from_parts(),
        };

        let port: u16 = parse_env("PORT", 5000)?;
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("Invalid listen address {host}:{port}"))?;

        let max_connections: u32 = parse_env("MAX_DB_CONNECTIONS", 10)?;

        let migrate_on_startup = std::env::var("DB_MIGRATE_ON_STARTUP")
            .ok()
            .map(|v| {
                !matches!(
                    v.trim().to_ascii_lowercase().as_str(),
                    "0" | "false" | "off"
                )
            })
            .unwrap_or(true);

        let api_key = std::env::var("API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let open_hour: u32 = parse_env("OPEN_HOUR", 8)?;
        let policy = AdmissionPolicy::new(open_hour)?;

        let cors_allow_origins = std::env::var("CORS_ALLOW_ORIGINS").ok();

        Ok(Self {
            database_url,
            listen_addr,
            max_connections,
            migrate_on_startup,
            api_key,
            policy,
            cors_allow_origins,
        })
    }
}

/// Build a Postgres URL from the discrete `POSTGRES_*` variables.
fn postgres_url_from_parts() -> String {
    let host = std::env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_string());
    let db = std::env::var("POSTGRES_DB").unwrap_or_else(|_| "attendance_db".to_string());
    let user = std::env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string());
    let password = std::env::var("POSTGRES_PASSWORD").unwrap_or_else(|_| "password".to_string());
    format!("postgres://{user}:{password}@{host}/{db}")
}

/// Parse an environment variable, falling back to `default` when unset.
pub(crate) fn parse_env<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {key} value {raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<ScanIngestor>,
    pub store: Arc<dyn AttendanceStore>,
    pub api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        clock: Arc<dyn Clock>,
        policy: AdmissionPolicy,
        api_key: Option<String>,
    ) -> Self {
        let ingestor = Arc::new(ScanIngestor::new(store.clone(), clock, policy));
        Self {
            ingestor,
            store,
            api_key: api_key.map(Arc::from),
        }
    }
}

/// Start the HTTP server.
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting attendance server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = ServerConfig::from_env()?;
    info!("Configuration loaded");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Max connections: {}", config.max_connections);
    info!("  Open hour: {:02}:00", config.policy.open_hour);
    if config.api_key.is_none() {
        warn!("API_KEY not set; /api/history is unauthenticated");
    }

    let store = connect_store(
        &config.database_url,
        config.max_connections,
        config.migrate_on_startup,
    )
    .await?;

    let state = AppState::new(
        store,
        Arc::new(SystemClock),
        config.policy,
        config.api_key.clone(),
    );

    let app = build_router(&config)?.with_state(state);

    info!("Starting HTTP server on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    info!("Attendance server is ready to accept connections");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Attendance server stopped");
    Ok(())
}

/// Connect to the store named by `database_url` (`postgres://` or `sqlite:`).
pub async fn connect_store(
    database_url: &str,
    max_connections: u32,
    migrate: bool,
) -> anyhow::Result<Arc<dyn AttendanceStore>> {
    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        info!("Connecting to PostgreSQL...");
        let store = PgAttendanceStore::connect(database_url, max_connections, migrate)
            .await
            .context("connecting to PostgreSQL")?;
        info!(migrated = migrate, "Connected to PostgreSQL");
        Ok(Arc::new(store))
    } else if database_url.starts_with("sqlite:") {
        info!("Opening SQLite store...");
        let store = SqliteAttendanceStore::connect(database_url, max_connections)
            .await
            .context("opening SQLite store")?;
        info!("SQLite store ready");
        Ok(Arc::new(store))
    } else {
        anyhow::bail!("Unsupported DATABASE_URL scheme (expected postgres:// or sqlite:)")
    }
}

/// Initialize the `tracing` subscriber (`RUST_LOG`, default `info`).
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Router with tracing and optional CORS layers.
pub fn build_router(config: &ServerConfig) -> anyhow::Result<Router<AppState>> {
    let mut router = crate::api::router().layer(TraceLayer::new_for_http());

    if let Some(cors_layer) = cors_layer(config.cors_allow_origins.as_deref())? {
        router = router.layer(cors_layer);
    }

    Ok(router)
}

fn cors_layer(origins: Option<&str>) -> anyhow::Result<Option<CorsLayer>> {
    let origins = match origins.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => return Ok(None),
    };

    let allow_origin = if origins == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {s:?}: {e}"))
            })
            .collect::<anyhow::Result<_>>()?;
        AllowOrigin::list(origins)
    };

    Ok(Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::HeaderName::from_static("x-api-key"),
            ]),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_parsing() {
        assert!(cors_layer(None).unwrap().is_none());
        assert!(cors_layer(Some("  ")).unwrap().is_none());
        assert!(cors_layer(Some("*")).unwrap().is_some());
        assert!(cors_layer(Some("https://a.example, https://b.example"))
            .unwrap()
            .is_some());
        assert!(cors_layer(Some("bad\norigin")).is_err());
    }

    #[test]
    fn test_parse_env_default_and_error() {
        assert_eq!(
            parse_env::<u16>("CARD_ATTENDANCE_TEST_UNSET_VAR", 42).unwrap(),
            42
        );
    }
}
