//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard};

use async_trait::async_trait;

use certchain_core::{
    Block, BlockId, Certificate, ChainHash, DraftCertificate, Lookup, NewBlock, PrevLink,
    RecordId,
};

use crate::error::{Result, StoreError};
use crate::traits::{AnchoredCertificate, ChainTx, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
/// Transactions run against a scratch copy that replaces the live state
/// only when the closure succeeds.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Clone, Default)]
struct MemoryStoreInner {
    /// Certificates indexed by ID.
    certificates: BTreeMap<RecordId, Certificate>,

    /// Blocks in insertion order.
    blocks: Vec<Block>,

    /// Last assigned ids. Never reused, like SQLite AUTOINCREMENT.
    last_certificate_id: i64,
    last_block_id: i64,
}

impl MemoryStoreInner {
    fn block_by_hash(&self, hash: &ChainHash) -> Option<&Block> {
        self.blocks.iter().find(|b| &b.current_hash == hash)
    }
}

impl ChainTx for MemoryStoreInner {
    fn insert_certificate(&mut self, draft: &DraftCertificate) -> Result<RecordId> {
        self.last_certificate_id += 1;
        let id = RecordId(self.last_certificate_id);
        self.certificates.insert(
            id,
            Certificate {
                id,
                subject: draft.subject.clone(),
                qualifier: draft.qualifier.clone(),
                issued_at: draft.issued_at,
                hash: draft.provisional_hash,
            },
        );
        Ok(id)
    }

    fn chain_tip(&mut self) -> Result<PrevLink> {
        Ok(PrevLink::from(self.blocks.last().map(|b| b.current_hash)))
    }

    fn insert_block(&mut self, block: &NewBlock) -> Result<BlockId> {
        self.last_block_id += 1;
        let id = BlockId(self.last_block_id);
        self.blocks.push(Block {
            id,
            previous_hash: block.previous_hash,
            current_hash: block.current_hash,
            timestamp: block.timestamp,
            payload: block.payload.clone(),
        });
        Ok(id)
    }

    fn finalize_certificate(&mut self, id: RecordId, hash: &ChainHash) -> Result<()> {
        let certificate = self
            .certificates
            .get_mut(&id)
            .ok_or_else(|| StoreError::MissingRow(format!("certificate {}", id)))?;
        certificate.hash = *hash;
        Ok(())
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn ChainTx) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;

        let mut scratch = inner.clone();
        match f(&mut scratch) {
            Ok(value) => {
                *inner = scratch;
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(error = %e, "rolling back ledger transaction");
                Err(e)
            }
        }
    }

    async fn find_certificate(&self, lookup: &Lookup) -> Result<Option<AnchoredCertificate>> {
        let inner = self.read()?;

        let certificate = match lookup {
            Lookup::Id(id) => inner.certificates.get(id),
            Lookup::Hash(hash) => inner.certificates.values().find(|c| &c.hash == hash),
        };

        Ok(certificate.and_then(|certificate| {
            inner
                .block_by_hash(&certificate.hash)
                .map(|block| AnchoredCertificate {
                    certificate: certificate.clone(),
                    previous_hash: block.previous_hash,
                    block_timestamp: block.timestamp,
                })
        }))
    }

    async fn list_certificates(&self) -> Result<Vec<Certificate>> {
        let inner = self.read()?;
        let mut certificates: Vec<Certificate> = inner.certificates.values().cloned().collect();
        certificates.sort_by(|a, b| b.issued_at.cmp(&a.issued_at).then(b.id.cmp(&a.id)));
        Ok(certificates)
    }

    async fn count_non_genesis_blocks(&self) -> Result<u64> {
        let inner = self.read()?;
        Ok(inner.blocks.iter().filter(|b| !b.is_genesis()).count() as u64)
    }

    async fn get_block_by_hash(&self, hash: &ChainHash) -> Result<Option<Block>> {
        let inner = self.read()?;
        Ok(inner.block_by_hash(hash).cloned())
    }

    async fn count_successors(&self, hash: &ChainHash) -> Result<u64> {
        let inner = self.read()?;
        Ok(inner
            .blocks
            .iter()
            .filter(|b| b.previous_hash.hash() == Some(hash))
            .count() as u64)
    }

    async fn list_blocks(&self) -> Result<Vec<Block>> {
        let inner = self.read()?;
        Ok(inner.blocks.clone())
    }

    async fn tip(&self) -> Result<Option<Block>> {
        let inner = self.read()?;
        Ok(inner.blocks.last().cloned())
    }
}
