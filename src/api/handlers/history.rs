//! Attendance history export handler (read-only).

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;

use crate::api::error::{unauthorized, ApiError, ErrorCode};
use crate::domain::{HistoryEntry, HistoryQuery};
use crate::server::AppState;

/// Header carrying the export API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// GET /api/history - Accepted check-ins, newest first.
pub async fn get_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    ensure_api_key(&state, &headers)?;
    let Query(query) = query?;

    let entries = state.store.history(&query).await?;
    Ok(Json(entries))
}

fn ensure_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.api_key.as_deref() else {
        return Ok(());
    };

    match headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        None => Err(unauthorized("Unauthorized")),
        Some(provided) if provided == expected => Ok(()),
        Some(_) => Err(ApiError::new(ErrorCode::InvalidApiKey, "Unauthorized")),
    }
}
