//! Scan ingestion handler.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::{missing_field, validation_error, ApiError};
use crate::api::types::{ScanRequest, ScanResponse};
use crate::domain::{CardUid, CardUidError, ScanOutcome};
use crate::server::AppState;

/// POST /scan - Adjudicate a card scan at the current server time.
///
/// Every policy outcome is a definitive response (201/200/403/404). Only
/// malformed requests (400) and persistence failures (500) are errors.
pub async fn submit_scan(
    State(state): State<AppState>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ScanResponse>), ApiError> {
    let Json(request) = payload?;

    let token = request.uid_token().ok_or_else(|| missing_field("uid"))?;
    let card_uid = CardUid::parse(&token).map_err(|e| match e {
        CardUidError::Empty => missing_field("uid"),
        other => validation_error("uid", format!("Invalid card UID: {}", other)),
    })?;

    let receipt = state.ingestor.submit_scan(&card_uid).await?;

    Ok((
        outcome_status(receipt.outcome),
        Json(ScanResponse::from(&receipt)),
    ))
}

fn outcome_status(outcome: ScanOutcome) -> StatusCode {
    match outcome {
        ScanOutcome::Accepted => StatusCode::CREATED,
        ScanOutcome::AlreadyRecorded => StatusCode::OK,
        ScanOutcome::RejectedTooEarly => StatusCode::FORBIDDEN,
        ScanOutcome::UnknownCard => StatusCode::NOT_FOUND,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_status_matches_wire_contract() {
        for outcome in [
            ScanOutcome::Accepted,
            ScanOutcome::AlreadyRecorded,
            ScanOutcome::RejectedTooEarly,
            ScanOutcome::UnknownCard,
        ] {
            assert_eq!(outcome_status(outcome).as_u16(), outcome.http_status());
        }
    }
}
