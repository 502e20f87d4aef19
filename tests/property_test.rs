//! Property-based tests using proptest.
//!
//! These tests verify invariants that should hold for any valid input.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use proptest::prelude::*;

use card_attendance::api::types::ScanResponse;
use card_attendance::client::transport::classify;
use card_attendance::infra::{AdmissionPolicy, FixedClock, ScanIngestor};
use card_attendance::{AttendanceStore, CardUid, ScanOutcome};

use common::store_with_people;

// ============================================================================
// Custom Strategies
// ============================================================================

/// A server receive time within three days of 2024-09-02
fn arb_received_at() -> impl Strategy<Value = NaiveDateTime> {
    (0i64..3, 0u32..24, 0u32..60).prop_map(|(day, hour, minute)| {
        NaiveDate::from_ymd_opt(2024, 9, 2)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
            + Duration::days(day)
    })
}

/// Card 0 and 1 are registered, card 2 is not
fn arb_scan() -> impl Strategy<Value = (usize, NaiveDateTime)> {
    (0usize..3, arb_received_at())
}

fn arb_outcome() -> impl Strategy<Value = ScanOutcome> {
    prop_oneof![
        Just(ScanOutcome::Accepted),
        Just(ScanOutcome::AlreadyRecorded),
        Just(ScanOutcome::RejectedTooEarly),
        Just(ScanOutcome::UnknownCard),
    ]
}

const CARDS: [&str; 3] = ["04A1B2C3", "584190834113", "DEADBEEF"];

// ============================================================================
// Card UID Properties
// ============================================================================

proptest! {
    /// Property: parsing accepts exactly the trimmed, bounded, printable tokens
    #[test]
    fn card_uid_parse_matches_rules(raw in "\\PC{0,80}|[ \\t]*[0-9A-F]{1,70}[ \\t\\n]*|.{0,10}") {
        let trimmed = raw.trim();
        let valid = !trimmed.is_empty()
            && trimmed.chars().count() <= CardUid::MAX_LEN
            && !trimmed.chars().any(char::is_control);

        match CardUid::parse(&raw) {
            Ok(uid) => {
                prop_assert!(valid);
                prop_assert_eq!(uid.as_str(), trimmed);
                // Parsing is idempotent
                prop_assert_eq!(CardUid::parse(uid.as_str()).unwrap(), uid);
            }
            Err(_) => prop_assert!(!valid),
        }
    }
}

// ============================================================================
// Wire Contract Properties
// ============================================================================

proptest! {
    /// Property: every outcome maps to a distinct status and back
    #[test]
    fn outcome_status_round_trips(outcome in arb_outcome()) {
        prop_assert_eq!(ScanOutcome::from_http_status(outcome.http_status()), Some(outcome));
    }

    /// Property: 5xx, 408 and 429 are never treated as definitive
    #[test]
    fn transient_statuses_never_discard(status in 100u16..600, label in "success|ignored|rejected|error") {
        let body = Some(ScanResponse { status: label.clone(), message: String::new() });
        let result = classify(status, body);

        let definitive_outcome = ScanOutcome::from_http_status(status)
            .map(|o| o.status_label() == label)
            .unwrap_or(false);
        let refused = (400..500).contains(&status)
            && status != 408
            && status != 429
            && ScanOutcome::from_http_status(status).is_none();

        prop_assert_eq!(result.is_ok(), definitive_outcome || refused);
    }
}

// ============================================================================
// Admission Policy Properties
// ============================================================================

proptest! {
    /// Property: the window admits exactly the hours at or after opening
    #[test]
    fn policy_admits_from_open_hour(open_hour in 0u32..24, at in arb_received_at()) {
        let policy = AdmissionPolicy::new(open_hour).unwrap();
        prop_assert_eq!(policy.admits(at), at.hour() >= open_hour);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: any scan sequence commits exactly one event per registered
    /// card and day inside the window, and nothing else
    #[test]
    fn ingest_commits_one_event_per_card_and_day(scans in prop::collection::vec(arb_scan(), 1..25)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (outcomes, history_len) = rt.block_on(async {
            let store = store_with_people(&[(CARDS[0], "Alice"), (CARDS[1], "Bob")]).await;
            let clock = Arc::new(FixedClock::new(scans[0].1));
            let ingestor = ScanIngestor::new(store.clone(), clock, AdmissionPolicy::default());

            let mut outcomes = Vec::new();
            for (card, received_at) in &scans {
                let uid = CardUid::parse(CARDS[*card]).unwrap();
                let receipt = ingestor.submit_scan_at(&uid, *received_at).await.unwrap();
                outcomes.push(receipt.outcome);
            }
            let history = store.history(&Default::default()).await.unwrap();
            (outcomes, history.len())
        });

        let mut seen = HashSet::new();
        for ((card, received_at), outcome) in scans.iter().zip(&outcomes) {
            let expected = if received_at.hour() < 8 {
                ScanOutcome::RejectedTooEarly
            } else if *card == 2 {
                ScanOutcome::UnknownCard
            } else if seen.insert((*card, received_at.date())) {
                ScanOutcome::Accepted
            } else {
                ScanOutcome::AlreadyRecorded
            };
            prop_assert_eq!(*outcome, expected);
        }

        prop_assert_eq!(history_len, seen.len());
    }
}
