//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use chrono::{NaiveDate, NaiveDateTime};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

use card_attendance::infra::{AdmissionPolicy, FixedClock, SqliteAttendanceStore};
use card_attendance::server::AppState;
use card_attendance::{AttendanceStore, CardUid};

/// Monday 2024-09-02 at the given local time
pub fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 9, 2)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn uid(raw: &str) -> CardUid {
    CardUid::parse(raw).unwrap()
}

/// In-memory store with the given `(uid, name)` people registered
pub async fn store_with_people(people: &[(&str, &str)]) -> Arc<SqliteAttendanceStore> {
    let store = SqliteAttendanceStore::in_memory().await.unwrap();
    for (card, name) in people {
        store.register_person(&uid(card), name).await.unwrap();
    }
    Arc::new(store)
}

pub fn test_state(
    store: Arc<SqliteAttendanceStore>,
    clock: Arc<FixedClock>,
    api_key: Option<&str>,
) -> AppState {
    AppState::new(
        store,
        clock,
        AdmissionPolicy::default(),
        api_key.map(str::to_string),
    )
}

pub fn test_router(state: AppState) -> axum::Router<()> {
    card_attendance::api::router().with_state(state)
}

/// Send a request to the test router.
pub async fn send_request(
    app: &axum::Router<()>,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
    api_key: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let body = body.map(|v| serde_json::to_vec(&v).unwrap());
    send_bytes(app, method, uri, body, api_key).await
}

/// Send a request with a raw (possibly malformed) JSON body.
pub async fn send_bytes(
    app: &axum::Router<()>,
    method: Method,
    uri: &str,
    body: Option<Vec<u8>>,
    api_key: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }

    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }

    let body = body.map(Body::from).unwrap_or_else(Body::empty);

    let response = app
        .clone()
        .into_service::<Body>()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec();

    let json = if bytes.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| json!({ "raw": String::from_utf8_lossy(&bytes) }))
    };

    (status, json)
}

/// POST /scan with the given uid
pub async fn post_scan(app: &axum::Router<()>, card: &str) -> (StatusCode, serde_json::Value) {
    send_request(app, Method::POST, "/scan", Some(json!({ "uid": card })), None).await
}
