//! REST API endpoints for card attendance.

use axum::routing::{get, post};
use axum::Router;

use crate::api::handlers::{get_history, health_check, readiness_check, submit_scan};
use crate::server::AppState;

/// Build the application router (without state).
///
/// - `POST /scan` - scan ingestion, the only route the edge client depends on
/// - `GET /api/history` - read-only export, guarded by `x-api-key` when configured
/// - `GET /health`, `GET /ready` - liveness and store readiness
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/scan", post(submit_scan))
        .route("/api/history", get(get_history))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
}
