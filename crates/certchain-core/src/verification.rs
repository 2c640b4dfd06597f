//! Lookup keys and verification results.

use serde::Serialize;
use std::fmt;

use crate::error::ValidationError;
use crate::hash::{ChainHash, PrevLink};
use crate::types::{RecordId, Timestamp};

/// How a caller names the certificate to verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    Hash(ChainHash),
    Id(RecordId),
}

impl Lookup {
    /// Parse a user-supplied hash. Surrounding whitespace is ignored.
    pub fn parse_hash(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        ChainHash::from_hex(trimmed)
            .map(Lookup::Hash)
            .map_err(|_| ValidationError::MalformedHash(trimmed.to_string()))
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Hash(hash) => write!(f, "hash {}", hash),
            Lookup::Id(id) => write!(f, "id {}", id),
        }
    }
}

impl From<ChainHash> for Lookup {
    fn from(hash: ChainHash) -> Self {
        Lookup::Hash(hash)
    }
}

impl From<RecordId> for Lookup {
    fn from(id: RecordId) -> Self {
        Lookup::Id(id)
    }
}

/// Outcome of verifying a certificate that was found in the chain.
///
/// `is_valid` means "found and joined to its block". It is not a digest
/// recomputation; the chain audit does that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub id: RecordId,
    pub subject: String,
    pub qualifier: String,
    pub issued_at: Timestamp,
    pub record_hash: ChainHash,
    pub previous_hash: PrevLink,
    pub block_timestamp: Timestamp,
    /// Number of non-genesis blocks in the whole chain.
    pub chain_length: u64,
    /// Genesis, or succeeded by at least one later block.
    pub is_linked: bool,
    pub is_valid: bool,
    /// Blocks naming this block as their predecessor. More than one is a fork.
    pub successors: u64,
}

impl VerificationResult {
    pub fn is_forked(&self) -> bool {
        self.successors > 1
    }
}
