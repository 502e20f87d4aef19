//! Shared request and response types for REST API handlers.

use serde::{Deserialize, Serialize};

use crate::domain::ScanReceipt;

// ============================================================================
// Scan types
// ============================================================================

/// Request body for `POST /scan`.
///
/// Readers report UIDs either as JSON strings or bare numbers; both are
/// accepted and normalized to the string form.
#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub uid: Option<serde_json::Value>,
}

impl ScanRequest {
    /// Raw uid token, if present and scalar
    pub fn uid_token(&self) -> Option<String> {
        match self.uid.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Response body for the four scan outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResponse {
    /// `success`, `ignored`, `rejected` or `error`
    pub status: String,
    pub message: String,
}

impl From<&ScanReceipt> for ScanResponse {
    fn from(receipt: &ScanReceipt) -> Self {
        Self {
            status: receipt.outcome.status_label().to_string(),
            message: receipt.message.clone(),
        }
    }
}

// ============================================================================
// Health types
// ============================================================================

/// Response for the liveness endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Response for the readiness endpoint
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub database: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_token_accepts_string_and_number() {
        let req: ScanRequest = serde_json::from_str(r#"{"uid": "0xA1B2"}"#).unwrap();
        assert_eq!(req.uid_token().as_deref(), Some("0xA1B2"));

        let req: ScanRequest = serde_json::from_str(r#"{"uid": 584190834113}"#).unwrap();
        assert_eq!(req.uid_token().as_deref(), Some("584190834113"));
    }

    #[test]
    fn test_uid_token_missing_or_structured() {
        let req: ScanRequest = serde_json::from_str("{}").unwrap();
        assert!(req.uid_token().is_none());

        let req: ScanRequest = serde_json::from_str(r#"{"uid": null}"#).unwrap();
        assert!(req.uid_token().is_none());

        let req: ScanRequest = serde_json::from_str(r#"{"uid": ["1"]}"#).unwrap();
        assert!(req.uid_token().is_none());
    }
}
