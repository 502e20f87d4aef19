//! Attendance records and scan outcomes
//!
//! `Person` and `AttendanceEvent` are owned by the server; `PendingScan` is
//! owned by the edge client and never crosses the wire as-is.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CardUid;

/// Card holder registered by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub card_uid: CardUid,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

/// Accepted check-in. At most one exists per card and calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    /// Store-assigned sequence id
    pub id: i64,

    pub card_uid: CardUid,

    /// Server wall-clock time at acceptance (server local time)
    #[serde(with = "entry_time_format")]
    pub entry_time: NaiveDateTime,

    /// Calendar day of `entry_time`; the dedup key together with `card_uid`
    pub event_date: NaiveDate,
}

/// Scan captured on the edge device whose server-side fate is still unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingScan {
    /// Insertion-ordered local row id
    pub id: i64,
    pub card_uid: CardUid,
    /// Client wall-clock at capture. Informational only; the server stamps its own time.
    pub captured_at: DateTime<Utc>,
}

/// Definitive adjudication of a scan by the ingestion service.
///
/// Every variant is final: the edge client never resends a scan once one of
/// these has been received for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanOutcome {
    /// A new attendance event was committed
    Accepted,
    /// The card already checked in on this calendar day (success-shaped no-op)
    AlreadyRecorded,
    /// Received before the daily opening hour
    RejectedTooEarly,
    /// No person is registered for the card
    UnknownCard,
}

impl ScanOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanOutcome::Accepted => "accepted",
            ScanOutcome::AlreadyRecorded => "already-recorded",
            ScanOutcome::RejectedTooEarly => "rejected-too-early",
            ScanOutcome::UnknownCard => "unknown-card",
        }
    }

    /// HTTP status used on the wire for this outcome
    pub fn http_status(&self) -> u16 {
        match self {
            ScanOutcome::Accepted => 201,
            ScanOutcome::AlreadyRecorded => 200,
            ScanOutcome::RejectedTooEarly => 403,
            ScanOutcome::UnknownCard => 404,
        }
    }

    /// Inverse of [`ScanOutcome::http_status`], used by the edge client.
    pub fn from_http_status(status: u16) -> Option<Self> {
        match status {
            201 => Some(ScanOutcome::Accepted),
            200 => Some(ScanOutcome::AlreadyRecorded),
            403 => Some(ScanOutcome::RejectedTooEarly),
            404 => Some(ScanOutcome::UnknownCard),
            _ => None,
        }
    }

    /// Value of the `status` field in the JSON response body
    pub fn status_label(&self) -> &'static str {
        match self {
            ScanOutcome::Accepted => "success",
            ScanOutcome::AlreadyRecorded => "ignored",
            ScanOutcome::RejectedTooEarly => "rejected",
            ScanOutcome::UnknownCard => "error",
        }
    }
}

impl std::fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of `submit_scan`, carrying enough context to build the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReceipt {
    pub outcome: ScanOutcome,
    pub card_uid: CardUid,
    #[serde(with = "entry_time_format")]
    pub received_at: NaiveDateTime,
    /// Committed event, present only for [`ScanOutcome::Accepted`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<AttendanceEvent>,
    /// Human-readable message for the card holder
    pub message: String,
}

/// One row of the read-only attendance history export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub name: String,
    pub uid: CardUid,
    #[serde(with = "entry_time_format")]
    pub time: NaiveDateTime,
}

/// Filter for the history export. Results are newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HistoryQuery {
    /// Restrict to a single calendar day
    pub date: Option<NaiveDate>,
    /// Maximum number of rows
    pub limit: Option<u32>,
}

impl HistoryQuery {
    pub const DEFAULT_LIMIT: u32 = 500;
    pub const MAX_LIMIT: u32 = 5000;

    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .min(Self::MAX_LIMIT)
    }
}

/// Serde module for `YYYY-MM-DD HH:MM:SS` timestamps
pub mod entry_time_format {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(time: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_status_round_trip() {
        for outcome in [
            ScanOutcome::Accepted,
            ScanOutcome::AlreadyRecorded,
            ScanOutcome::RejectedTooEarly,
            ScanOutcome::UnknownCard,
        ] {
            assert_eq!(
                ScanOutcome::from_http_status(outcome.http_status()),
                Some(outcome)
            );
        }
        assert_eq!(ScanOutcome::from_http_status(400), None);
        assert_eq!(ScanOutcome::from_http_status(500), None);
    }

    #[test]
    fn test_outcome_serializes_kebab_case() {
        let json = serde_json::to_string(&ScanOutcome::RejectedTooEarly).unwrap();
        assert_eq!(json, "\"rejected-too-early\"");
        assert_eq!(ScanOutcome::AlreadyRecorded.to_string(), "already-recorded");
    }

    #[test]
    fn test_history_entry_time_format() {
        let entry = HistoryEntry {
            id: 7,
            name: "Alice".to_string(),
            uid: CardUid::parse("1234").unwrap(),
            time: NaiveDate::from_ymd_opt(2024, 3, 4)
                .unwrap()
                .and_hms_opt(9, 5, 0)
                .unwrap(),
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["time"], "2024-03-04 09:05:00");
        assert_eq!(json["uid"], "1234");

        let parsed: HistoryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_history_limit_is_capped() {
        assert_eq!(HistoryQuery::default().effective_limit(), 500);
        let query = HistoryQuery {
            date: None,
            limit: Some(1_000_000),
        };
        assert_eq!(query.effective_limit(), HistoryQuery::MAX_LIMIT);
    }
}
