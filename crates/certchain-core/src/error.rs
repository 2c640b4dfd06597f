//! Error types for CertChain Core.

use thiserror::Error;

/// Core errors that can occur while encoding or decoding ledger data.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("invalid hash {0:?}")]
    InvalidHash(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Encoding(e.to_string())
    }
}

/// Caller-correctable input errors. Surfaced verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("malformed certificate hash: expected 64 hex characters, got {0:?}")]
    MalformedHash(String),
}
