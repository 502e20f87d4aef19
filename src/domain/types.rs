//! Core type definitions for card attendance

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when a raw card token cannot be used as a [`CardUid`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardUidError {
    #[error("card uid is empty")]
    Empty,

    #[error("card uid exceeds {max} characters")]
    TooLong { max: usize },

    #[error("card uid contains control characters")]
    ControlCharacter,
}

/// Unique token encoded on a physical card.
///
/// Readers emit UIDs as decimal or hex strings; the value is opaque here.
/// Surrounding whitespace is stripped so a keyboard-wedge reader's trailing
/// newline and the server's stored key always agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardUid(String);

impl CardUid {
    /// Maximum accepted UID length (matches the column width of both stores)
    pub const MAX_LEN: usize = 64;

    pub fn parse(raw: &str) -> Result<Self, CardUidError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CardUidError::Empty);
        }
        if trimmed.chars().count() > Self::MAX_LEN {
            return Err(CardUidError::TooLong { max: Self::MAX_LEN });
        }
        if trimmed.chars().any(char::is_control) {
            return Err(CardUidError::ControlCharacter);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CardUid {
    type Err = CardUidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CardUid {
    type Error = CardUidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CardUid> for String {
    fn from(uid: CardUid) -> Self {
        uid.0
    }
}

impl AsRef<str> for CardUid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
