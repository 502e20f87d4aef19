//! Health check handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::warn;

use crate::api::types::{HealthResponse, ReadinessResponse};
use crate::server::AppState;

/// GET /health - Liveness check.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "card-attendance",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /ready - Readiness check against the attendance store.
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    match state.store.ping().await {
        Ok(()) => Ok(Json(ReadinessResponse {
            status: "ready",
            database: "connected",
        })),
        Err(e) => {
            warn!(error = %e, "readiness check failed");
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "unavailable",
                    database: "disconnected",
                }),
            ))
        }
    }
}
