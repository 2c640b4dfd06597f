//! Ledger behavior under interleaved appends and failing writes.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use certchain::core::{BlockId, DraftCertificate, NewBlock};
use certchain::store::{
    AnchoredCertificate, ChainTx, MemoryStore, Result, SqliteStore, Store, StoreError,
};
use certchain::{
    AppendPolicy, Block, Certificate, ChainHash, ChainIssue, ErrorKind, Ledger, LedgerConfig,
    Lookup, PrevLink, RecordId,
};
use tokio::sync::Barrier;

/// Wraps a store with two switches: a barrier every `tip()` caller must pass,
/// and a flag that makes `finalize_certificate` fail.
struct Faulty<S> {
    inner: S,
    tip_barrier: Option<Barrier>,
    fail_finalize: AtomicBool,
}

impl<S: Store> Faulty<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            tip_barrier: None,
            fail_finalize: AtomicBool::new(false),
        }
    }

    /// Hold every tip reader until `n` of them have read.
    fn with_tip_barrier(mut self, n: usize) -> Self {
        self.tip_barrier = Some(Barrier::new(n));
        self
    }
}

struct FailingFinalize<'a> {
    tx: &'a mut dyn ChainTx,
}

impl ChainTx for FailingFinalize<'_> {
    fn insert_certificate(&mut self, draft: &DraftCertificate) -> Result<RecordId> {
        self.tx.insert_certificate(draft)
    }

    fn chain_tip(&mut self) -> Result<PrevLink> {
        self.tx.chain_tip()
    }

    fn insert_block(&mut self, block: &NewBlock) -> Result<BlockId> {
        self.tx.insert_block(block)
    }

    fn finalize_certificate(&mut self, id: RecordId, _hash: &ChainHash) -> Result<()> {
        Err(StoreError::MissingRow(format!("certificate {}", id)))
    }
}

#[async_trait]
impl<S: Store> Store for Faulty<S> {
    async fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn ChainTx) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        if self.fail_finalize.load(Ordering::SeqCst) {
            self.inner
                .atomically(move |tx| f(&mut FailingFinalize { tx }))
                .await
        } else {
            self.inner.atomically(f).await
        }
    }

    async fn find_certificate(&self, lookup: &Lookup) -> Result<Option<AnchoredCertificate>> {
        self.inner.find_certificate(lookup).await
    }

    async fn list_certificates(&self) -> Result<Vec<Certificate>> {
        self.inner.list_certificates().await
    }

    async fn count_non_genesis_blocks(&self) -> Result<u64> {
        self.inner.count_non_genesis_blocks().await
    }

    async fn get_block_by_hash(&self, hash: &ChainHash) -> Result<Option<Block>> {
        self.inner.get_block_by_hash(hash).await
    }

    async fn count_successors(&self, hash: &ChainHash) -> Result<u64> {
        self.inner.count_successors(hash).await
    }

    async fn list_blocks(&self) -> Result<Vec<Block>> {
        self.inner.list_blocks().await
    }

    async fn tip(&self) -> Result<Option<Block>> {
        let tip = self.inner.tip().await?;
        if let Some(barrier) = &self.tip_barrier {
            barrier.wait().await;
        }
        Ok(tip)
    }
}

fn ledger<S: Store>(store: Faulty<S>, append_policy: AppendPolicy) -> Ledger<Faulty<S>> {
    Ledger::new(store, LedgerConfig { append_policy })
}

async fn unguarded_appends_fork<S: Store>(inner: S) {
    let ledger = ledger(Faulty::new(inner).with_tip_barrier(2), AppendPolicy::Unguarded);

    // Both appends read the (empty) tip before either writes.
    let (alice, bob) = tokio::join!(
        ledger.append("Alice", "Algorithms"),
        ledger.append("Bob", "Systems"),
    );
    alice.unwrap();
    bob.unwrap();

    let blocks = ledger.store().list_blocks().await.unwrap();
    assert_eq!(blocks.len(), 2);
    assert!(blocks.iter().all(Block::is_genesis));

    let report = ledger.audit().await.unwrap();
    assert_eq!(
        report.issues,
        vec![ChainIssue::ExtraGenesis { block: BlockId(2) }]
    );
}

#[tokio::test]
async fn test_unguarded_appends_fork_memory() {
    unguarded_appends_fork(MemoryStore::new()).await;
}

#[tokio::test]
async fn test_unguarded_appends_fork_sqlite() {
    unguarded_appends_fork(SqliteStore::open_memory().unwrap()).await;
}

#[tokio::test]
async fn test_serialized_appends_stay_linear() {
    // The serialized path reads the tip inside the transaction, so the
    // barrier on `Store::tip` is never reached.
    let ledger = ledger(
        Faulty::new(SqliteStore::open_memory().unwrap()).with_tip_barrier(2),
        AppendPolicy::Serialized,
    );

    let (alice, bob) = tokio::join!(
        ledger.append("Alice", "Algorithms"),
        ledger.append("Bob", "Systems"),
    );
    let (alice, bob) = (alice.unwrap(), bob.unwrap());

    let blocks = ledger.store().list_blocks().await.unwrap();
    assert_eq!(blocks.len(), 2);
    assert!(blocks[0].is_genesis());
    assert_eq!(blocks[1].previous_hash, PrevLink::Block(blocks[0].current_hash));

    let report = ledger.audit().await.unwrap();
    assert!(report.is_consistent(), "{:?}", report.issues);

    let first = if blocks[0].current_hash == alice.hash {
        &alice
    } else {
        &bob
    };
    assert!(ledger.verify(first.hash).await.unwrap().is_linked);
}

async fn failed_append_leaves_ledger_unchanged<S: Store>(inner: S, policy: AppendPolicy) {
    let ledger = ledger(Faulty::new(inner), policy);
    let alice = ledger.append("Alice", "Algorithms").await.unwrap();

    ledger.store().fail_finalize.store(true, Ordering::SeqCst);
    let err = ledger.append("Bob", "Systems").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
    assert!(matches!(
        err,
        certchain::LedgerError::Persistence(StoreError::MissingRow(_))
    ));

    let certificates = ledger.list().await.unwrap();
    assert_eq!(certificates.len(), 1);
    assert_eq!(certificates[0], alice);

    let blocks = ledger.store().list_blocks().await.unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(ledger.tip().await.unwrap().unwrap().current_hash, alice.hash);
    assert!(ledger.audit().await.unwrap().is_consistent());

    // The next successful append picks up where the ledger left off.
    ledger.store().fail_finalize.store(false, Ordering::SeqCst);
    ledger.append("Carol", "Compilers").await.unwrap();
    let tip = ledger.tip().await.unwrap().unwrap();
    assert_eq!(tip.previous_hash, PrevLink::Block(alice.hash));
}

#[tokio::test]
async fn test_failed_append_rolls_back_sqlite() {
    failed_append_leaves_ledger_unchanged(
        SqliteStore::open_memory().unwrap(),
        AppendPolicy::Unguarded,
    )
    .await;
}

#[tokio::test]
async fn test_failed_append_rolls_back_memory() {
    failed_append_leaves_ledger_unchanged(MemoryStore::new(), AppendPolicy::Serialized).await;
}
