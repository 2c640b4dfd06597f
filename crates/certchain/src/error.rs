//! Error types for the Ledger.

use certchain_core::{Lookup, ValidationError};
use certchain_store::StoreError;
use thiserror::Error;

/// Errors that can occur during Ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Missing or malformed caller input. Nothing was persisted.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No certificate joined to a block matches the lookup.
    #[error("certificate not found in the chain: {0}")]
    NotFound(Lookup),

    /// Storage error. Any partial write has been rolled back.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
}

/// Coarse classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationFailure,
    NotFound,
    PersistenceFailure,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation(_) => ErrorKind::ValidationFailure,
            LedgerError::NotFound(_) => ErrorKind::NotFound,
            LedgerError::Persistence(_) => ErrorKind::PersistenceFailure,
        }
    }
}

/// Result type for Ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
