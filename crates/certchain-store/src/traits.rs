//! Store trait: the abstract interface for ledger persistence.
//!
//! The ledger is storage-agnostic. Implementations include SQLite
//! (primary) and in-memory (for tests).

use async_trait::async_trait;
use certchain_core::{
    Block, BlockId, Certificate, ChainHash, DraftCertificate, Lookup, NewBlock, PrevLink,
    RecordId, Timestamp,
};

use crate::error::Result;

/// A certificate joined to the block whose `current_hash` equals the
/// certificate's hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchoredCertificate {
    pub certificate: Certificate,
    pub previous_hash: PrevLink,
    pub block_timestamp: Timestamp,
}

/// Writes available inside one store transaction.
///
/// Every call made through a `ChainTx` commits together or not at all. The
/// store does not check chain structure; a caller may insert a block on a
/// stale tip and the store will accept it.
pub trait ChainTx {
    /// Insert a certificate row carrying its provisional hash.
    fn insert_certificate(&mut self, draft: &DraftCertificate) -> Result<RecordId>;

    /// `current_hash` of the highest-id block, or genesis on an empty chain.
    fn chain_tip(&mut self) -> Result<PrevLink>;

    /// Insert a sealed block.
    fn insert_block(&mut self, block: &NewBlock) -> Result<BlockId>;

    /// Overwrite a certificate's hash with its block's digest.
    fn finalize_certificate(&mut self, id: RecordId, hash: &ChainHash) -> Result<()>;
}

/// The Store trait: async interface for ledger persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Scoped transactions**: [`Store::atomically`] owns the connection for
///   the whole closure and releases it on every exit path. An `Err` from the
///   closure rolls back every write it made.
/// - **Read-only queries**: everything else observes committed rows only.
/// - **No caching**: entities are read fresh on every call.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Run `f` inside a single transaction.
    async fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn ChainTx) -> Result<T> + Send + 'static,
        T: Send + 'static;

    // ─────────────────────────────────────────────────────────────────────────
    // Certificate Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Find a certificate by hash or id, joined to its owning block.
    ///
    /// Returns `None` when the certificate is missing or no block carries
    /// its hash.
    async fn find_certificate(&self, lookup: &Lookup) -> Result<Option<AnchoredCertificate>>;

    /// All certificates, newest issuance first.
    async fn list_certificates(&self) -> Result<Vec<Certificate>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Block Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Number of blocks whose `previous_hash` is not the genesis sentinel.
    async fn count_non_genesis_blocks(&self) -> Result<u64>;

    /// Get the block with the given `current_hash`.
    async fn get_block_by_hash(&self, hash: &ChainHash) -> Result<Option<Block>>;

    /// Number of blocks whose `previous_hash` equals `hash`.
    async fn count_successors(&self, hash: &ChainHash) -> Result<u64>;

    /// All blocks in id order.
    async fn list_blocks(&self) -> Result<Vec<Block>>;

    /// The highest-id block.
    async fn tip(&self) -> Result<Option<Block>>;
}
