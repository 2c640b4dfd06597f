//! Strong type definitions for CertChain.
//!
//! Identifiers are newtypes to prevent mixing up certificate and block ids
//! at compile time.

use chrono::{NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::CoreError;

/// Store-assigned certificate identifier. Monotonic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned block identifier. Monotonic; defines chain order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub i64);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wall-clock instant with microsecond precision.
///
/// The canonical text form is `YYYY-MM-DDTHH:MM:SS.ffffff`. That text is
/// what gets hashed and stored, so sub-microsecond precision is dropped at
/// capture time to keep text round-trips lossless.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    const FORMAT: &'static str = "%Y-%m-%dT%H:%M:%S%.6f";
    const PARSE_FORMAT: &'static str = "%Y-%m-%dT%H:%M:%S%.f";

    /// Capture the current UTC time, truncated to microseconds.
    pub fn now() -> Self {
        Self::from_naive(Utc::now().naive_utc())
    }

    /// Wrap a naive datetime, truncating to microseconds.
    pub fn from_naive(dt: NaiveDateTime) -> Self {
        let micros = dt.nanosecond() / 1_000 * 1_000;
        Self(dt.with_nanosecond(micros).unwrap_or(dt))
    }

    pub fn as_naive(&self) -> &NaiveDateTime {
        &self.0
    }

    /// The text form used for hashing and storage.
    pub fn to_canonical(&self) -> String {
        self.0.format(Self::FORMAT).to_string()
    }

    /// Parse the canonical text form. A missing fractional part is accepted.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        NaiveDateTime::parse_from_str(s, Self::PARSE_FORMAT)
            .map(Self::from_naive)
            .map_err(|e| CoreError::InvalidTimestamp {
                value: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.to_canonical())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
