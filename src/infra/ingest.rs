//! Scan ingestion policy
//!
//! Adjudicates a scan in a fixed order, each step short-circuiting:
//!
//! 1. **Time window**: server local hour before the opening hour is rejected
//!    without touching the store.
//! 2. **Identity**: the card must resolve to a registered person.
//! 3. **Dedup**: a second scan on the same calendar day is a no-op.
//! 4. **Commit**: otherwise one attendance event is inserted.
//!
//! Steps 2-4 run as one store transaction (see [`AttendanceStore::record_attendance`]).
//! Only the server clock is consulted; client capture times never affect the policy.

use std::sync::Arc;

use chrono::{NaiveDateTime, Timelike};
use tracing::{debug, info, instrument};

use crate::domain::{CardUid, ScanOutcome, ScanReceipt};
use crate::infra::{AttendanceError, AttendanceStore, Clock, RecordResult, Result};

/// Time-of-day admission rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
    /// First local hour (0-23) at which scans are admitted
    pub open_hour: u32,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self { open_hour: 8 }
    }
}

impl AdmissionPolicy {
    pub fn new(open_hour: u32) -> Result<Self> {
        if open_hour > 23 {
            return Err(AttendanceError::Configuration(format!(
                "open hour must be 0-23, got {open_hour}"
            )));
        }
        Ok(Self { open_hour })
    }

    /// Whether a scan received at `at` falls inside the daily window
    pub fn admits(&self, at: NaiveDateTime) -> bool {
        at.hour() >= self.open_hour
    }
}

/// Remote ingestion service: the trust boundary for scan adjudication.
pub struct ScanIngestor {
    store: Arc<dyn AttendanceStore>,
    clock: Arc<dyn Clock>,
    policy: AdmissionPolicy,
}

impl ScanIngestor {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        clock: Arc<dyn Clock>,
        policy: AdmissionPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn AttendanceStore> {
        &self.store
    }

    /// Adjudicate a scan at the current server time.
    pub async fn submit_scan(&self, card_uid: &CardUid) -> Result<ScanReceipt> {
        let received_at = self.clock.now();
        self.submit_scan_at(card_uid, received_at).await
    }

    /// Adjudicate a scan received at `received_at` (server local time).
    #[instrument(skip(self), fields(card_uid = %card_uid))]
    pub async fn submit_scan_at(
        &self,
        card_uid: &CardUid,
        received_at: NaiveDateTime,
    ) -> Result<ScanReceipt> {
        if !self.policy.admits(received_at) {
            debug!(open_hour = self.policy.open_hour, "scan outside time window");
            return Ok(ScanReceipt {
                outcome: ScanOutcome::RejectedTooEarly,
                card_uid: card_uid.clone(),
                received_at,
                event: None,
                message: format!(
                    "System not active before {:02}:00",
                    self.policy.open_hour
                ),
            });
        }

        let receipt = match self.store.record_attendance(card_uid, received_at).await? {
            RecordResult::Recorded { event, full_name } => {
                info!(event_id = event.id, "attendance recorded");
                ScanReceipt {
                    outcome: ScanOutcome::Accepted,
                    card_uid: card_uid.clone(),
                    received_at,
                    event: Some(event),
                    message: format!("Welcome, {full_name}!"),
                }
            }
            RecordResult::AlreadyRecorded { full_name } => {
                debug!("already checked in today");
                ScanReceipt {
                    outcome: ScanOutcome::AlreadyRecorded,
                    card_uid: card_uid.clone(),
                    received_at,
                    event: None,
                    message: format!("Already checked in today: {full_name}"),
                }
            }
            RecordResult::UnknownCard => {
                info!("unknown card");
                ScanReceipt {
                    outcome: ScanOutcome::UnknownCard,
                    card_uid: card_uid.clone(),
                    received_at,
                    event: None,
                    message: "Unknown card UID".to_string(),
                }
            }
        };

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{FixedClock, MockAttendanceStore, SqliteAttendanceStore};
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, 2)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn uid(raw: &str) -> CardUid {
        CardUid::parse(raw).unwrap()
    }

    async fn ingestor_with_alice() -> (ScanIngestor, Arc<FixedClock>) {
        let store = SqliteAttendanceStore::in_memory().await.unwrap();
        store.register_person(&uid("1234"), "Alice").await.unwrap();
        let clock = Arc::new(FixedClock::new(at(9, 0)));
        let ingestor = ScanIngestor::new(
            Arc::new(store),
            clock.clone(),
            AdmissionPolicy::default(),
        );
        (ingestor, clock)
    }

    #[test]
    fn test_policy_bounds() {
        assert!(AdmissionPolicy::new(24).is_err());
        let policy = AdmissionPolicy::new(8).unwrap();
        assert!(!policy.admits(at(7, 59)));
        assert!(policy.admits(at(8, 0)));
        assert!(policy.admits(at(23, 59)));
    }

    #[tokio::test]
    async fn test_too_early_never_reaches_store() {
        let mut store = MockAttendanceStore::new();
        store.expect_record_attendance().never();
        store.expect_find_person().never();

        let ingestor = ScanIngestor::new(
            Arc::new(store),
            Arc::new(FixedClock::new(at(7, 59))),
            AdmissionPolicy::default(),
        );

        let receipt = ingestor.submit_scan(&uid("1234")).await.unwrap();
        assert_eq!(receipt.outcome, ScanOutcome::RejectedTooEarly);
        assert_eq!(receipt.message, "System not active before 08:00");
    }

    #[tokio::test]
    async fn test_accept_then_already_recorded() {
        let (ingestor, clock) = ingestor_with_alice().await;

        let first = ingestor.submit_scan(&uid("1234")).await.unwrap();
        assert_eq!(first.outcome, ScanOutcome::Accepted);
        assert_eq!(first.message, "Welcome, Alice!");
        let event = first.event.expect("accepted scan carries its event");
        assert_eq!(event.entry_time, at(9, 0));
        assert_eq!(event.event_date, at(9, 0).date());

        clock.set(at(9, 1));
        let second = ingestor.submit_scan(&uid("1234")).await.unwrap();
        assert_eq!(second.outcome, ScanOutcome::AlreadyRecorded);
        assert_eq!(second.message, "Already checked in today: Alice");
        assert!(second.event.is_none());

        let history = ingestor
            .store()
            .history(&Default::default())
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_card() {
        let (ingestor, _clock) = ingestor_with_alice().await;

        let receipt = ingestor.submit_scan(&uid("9999")).await.unwrap();
        assert_eq!(receipt.outcome, ScanOutcome::UnknownCard);
        assert_eq!(receipt.outcome.http_status(), 404);
    }

    #[tokio::test]
    async fn test_next_day_is_accepted_again() {
        let (ingestor, clock) = ingestor_with_alice().await;

        assert_eq!(
            ingestor.submit_scan(&uid("1234")).await.unwrap().outcome,
            ScanOutcome::Accepted
        );

        clock.set(at(9, 0) + chrono::Duration::days(1));
        assert_eq!(
            ingestor.submit_scan(&uid("1234")).await.unwrap().outcome,
            ScanOutcome::Accepted
        );
    }

    #[tokio::test]
    async fn test_early_scan_leaves_no_row_even_when_resent() {
        let (ingestor, clock) = ingestor_with_alice().await;
        clock.set(at(7, 59));

        for _ in 0..3 {
            let receipt = ingestor.submit_scan(&uid("1234")).await.unwrap();
            assert_eq!(receipt.outcome, ScanOutcome::RejectedTooEarly);
        }

        let history = ingestor
            .store()
            .history(&Default::default())
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let mut store = MockAttendanceStore::new();
        store
            .expect_record_attendance()
            .returning(|_, _| Err(AttendanceError::Internal("disk full".to_string())));

        let ingestor = ScanIngestor::new(
            Arc::new(store),
            Arc::new(FixedClock::new(at(10, 0))),
            AdmissionPolicy::default(),
        );

        let err = ingestor.submit_scan(&uid("1234")).await.unwrap_err();
        assert!(matches!(err, AttendanceError::Internal(_)));
    }
}
