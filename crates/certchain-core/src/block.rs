//! Blocks: immutable ledger entries.

use serde::{Deserialize, Serialize};

use crate::certificate::CertificatePayload;
use crate::error::CoreError;
use crate::hash::{digest_parts, ChainHash, PrevLink};
use crate::types::{BlockId, Timestamp};

/// Block digest over `payload ‖ previous ‖ timestamp`, in that order.
pub fn block_hash(payload: &str, previous: &PrevLink, timestamp: &Timestamp) -> ChainHash {
    digest_parts(&[
        payload.as_bytes(),
        previous.to_text().as_bytes(),
        timestamp.to_canonical().as_bytes(),
    ])
}

/// A block that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlock {
    pub previous_hash: PrevLink,
    pub current_hash: ChainHash,
    pub timestamp: Timestamp,
    pub payload: String,
}

impl NewBlock {
    /// Build a block on top of `previous`, computing its digest.
    pub fn seal(payload: String, previous: PrevLink, timestamp: Timestamp) -> Self {
        let current_hash = block_hash(&payload, &previous, &timestamp);
        Self {
            previous_hash: previous,
            current_hash,
            timestamp,
            payload,
        }
    }
}

/// A persisted block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub previous_hash: PrevLink,
    pub current_hash: ChainHash,
    pub timestamp: Timestamp,
    pub payload: String,
}

impl Block {
    pub fn is_genesis(&self) -> bool {
        self.previous_hash.is_genesis()
    }

    /// Re-hash the stored fields.
    pub fn recompute_hash(&self) -> ChainHash {
        block_hash(&self.payload, &self.previous_hash, &self.timestamp)
    }

    /// Decode the embedded certificate snapshot.
    pub fn certificate_payload(&self) -> Result<CertificatePayload, CoreError> {
        CertificatePayload::from_canonical(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::digest;

    fn ts() -> Timestamp {
        Timestamp::parse("2024-01-01T00:00:01.000000").unwrap()
    }

    #[test]
    fn test_block_hash_field_order() {
        let expected = digest(b"{}02024-01-01T00:00:01.000000");
        assert_eq!(block_hash("{}", &PrevLink::Genesis, &ts()), expected);

        let prev = digest(b"prev");
        let text = format!("{{}}{}2024-01-01T00:00:01.000000", prev.to_hex());
        assert_eq!(
            block_hash("{}", &PrevLink::Block(prev), &ts()),
            digest(text.as_bytes())
        );
    }

    #[test]
    fn test_sealed_block_recomputes() {
        let sealed = NewBlock::seal("payload".into(), PrevLink::Genesis, ts());
        let block = Block {
            id: BlockId(1),
            previous_hash: sealed.previous_hash,
            current_hash: sealed.current_hash,
            timestamp: sealed.timestamp,
            payload: sealed.payload,
        };
        assert!(block.is_genesis());
        assert_eq!(block.recompute_hash(), block.current_hash);
    }

    #[test]
    fn test_tampered_payload_changes_hash() {
        let sealed = NewBlock::seal("payload".into(), PrevLink::Genesis, ts());
        let forged = block_hash("payl0ad", &sealed.previous_hash, &sealed.timestamp);
        assert_ne!(forged, sealed.current_hash);
    }
}
