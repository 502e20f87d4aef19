//! Delivery of pending scans to the ingestion service
//!
//! A reply is either a definitive [`Delivery`] (the scan may be dropped from
//! the local queue) or a [`TransportError`] (the scan must be kept and retried).

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use thiserror::Error;

use crate::api::types::ScanResponse;
use crate::domain::{PendingScan, ScanOutcome};

/// Definitive server verdict on a delivered scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// One of the four policy outcomes
    Adjudicated(ScanOutcome),
    /// The server refused the request itself (4xx other than 408/429).
    /// Resending the same payload cannot succeed.
    Malformed { status: u16 },
}

impl Delivery {
    pub fn outcome(&self) -> Option<ScanOutcome> {
        match self {
            Delivery::Adjudicated(outcome) => Some(*outcome),
            Delivery::Malformed { .. } => None,
        }
    }
}

/// Server reply to one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerReply {
    pub status: u16,
    pub delivery: Delivery,
    pub message: Option<String>,
}

/// Failures that leave a scan's fate unknown.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("could not connect to server: {0}")]
    Connect(String),

    #[error("server error (status {status})")]
    Server { status: u16 },

    #[error("server busy (status {status})")]
    Unavailable { status: u16 },

    #[error("unexpected reply (status {status})")]
    Unexpected { status: u16 },

    #[error("request failed: {0}")]
    Request(String),
}

/// Carries one pending scan to the ingestion service.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ScanTransport: Send + Sync {
    async fn deliver(&self, scan: &PendingScan) -> Result<ServerReply, TransportError>;
}

#[derive(Serialize)]
struct ScanPayload<'a> {
    uid: &'a str,
}

/// HTTP transport posting `{"uid": ...}` to the scan route.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Build a transport whose every request is bounded by `timeout`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("card-attendance-scan-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ScanTransport for HttpTransport {
    async fn deliver(&self, scan: &PendingScan) -> Result<ServerReply, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ScanPayload {
                uid: scan.card_uid.as_str(),
            })
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(from_reqwest)?;
        let parsed = serde_json::from_slice::<ScanResponse>(&body).ok();

        classify(status, parsed)
    }
}

fn from_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}

/// Map an HTTP status and decoded body to a delivery result.
///
/// The four outcome statuses only count as definitive when the body carries
/// the matching `status` label, so a proxy or a mistyped server URL answering
/// 200/404 can never cause a queued scan to be discarded.
pub fn classify(status: u16, body: Option<ScanResponse>) -> Result<ServerReply, TransportError> {
    if let Some(outcome) = ScanOutcome::from_http_status(status) {
        return match body {
            Some(body) if body.status == outcome.status_label() => Ok(ServerReply {
                status,
                delivery: Delivery::Adjudicated(outcome),
                message: Some(body.message),
            }),
            _ => Err(TransportError::Unexpected { status }),
        };
    }

    match status {
        408 | 429 => Err(TransportError::Unavailable { status }),
        400..=499 => Ok(ServerReply {
            status,
            delivery: Delivery::Malformed { status },
            message: None,
        }),
        500..=599 => Err(TransportError::Server { status }),
        _ => Err(TransportError::Unexpected { status }),
    }
}
