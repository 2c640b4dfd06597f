//! The Ledger: unified API for issuing and verifying certificates.
//!
//! The write path (`append`) and the read path (`verify`) meet only at the
//! store. Nothing is cached between calls.

use std::sync::Arc;

use certchain_core::{
    Block, Certificate, DraftCertificate, IssueRequest, Lookup, NewBlock, PrevLink, Timestamp,
    VerificationResult,
};
use certchain_store::{ChainTx, Store};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::audit::{audit_chain, AuditReport};
use crate::error::{LedgerError, Result};

/// How concurrent appends through one [`Ledger`] are coordinated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppendPolicy {
    /// The tip is read as a separate query before the write transaction
    /// opens. Two racing appends may read the same tip and fork the chain;
    /// `audit` reports that.
    #[default]
    Unguarded,
    /// Appends hold an in-process lock and read the tip inside the write
    /// transaction, so they never interleave.
    Serialized,
}

/// Configuration for the Ledger.
#[derive(Debug, Clone, Default)]
pub struct LedgerConfig {
    /// Where the tip is read and whether appends take a lock.
    pub append_policy: AppendPolicy,
}

/// The main Ledger struct.
///
/// Provides a unified API for:
/// - Issuing certificates (`append`)
/// - Verifying certificates (`verify`)
/// - Listing certificates
/// - Auditing the whole chain
pub struct Ledger<S: Store> {
    /// The storage backend.
    store: Arc<S>,
    /// Configuration.
    config: LedgerConfig,
    /// Held across appends under [`AppendPolicy::Serialized`].
    write_lock: Mutex<()>,
}

impl<S: Store> Ledger<S> {
    /// Create a new ledger over `store`.
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
            write_lock: Mutex::new(()),
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Write Path
    // ─────────────────────────────────────────────────────────────────────────

    /// Issue a certificate and link it into the chain.
    ///
    /// The certificate row, its block and the hash finalization commit
    /// together. On any failure the ledger is left exactly as it was.
    pub async fn append(&self, subject: &str, qualifier: &str) -> Result<Certificate> {
        let request = IssueRequest::new(subject, qualifier)?;

        let (_guard, read_tip) = match self.config.append_policy {
            AppendPolicy::Serialized => (Some(self.write_lock.lock().await), None),
            AppendPolicy::Unguarded => {
                let tip = self.store.tip().await?.map(|block| block.current_hash);
                (None, Some(PrevLink::from(tip)))
            }
        };

        let draft = request.draft(Timestamp::now());
        debug!(
            subject = %draft.subject,
            qualifier = %draft.qualifier,
            provisional = %draft.provisional_hash,
            "issuing certificate"
        );

        let certificate = self
            .store
            .atomically(move |tx| link_certificate(tx, draft, read_tip))
            .await?;

        info!(id = %certificate.id, hash = %certificate.hash, "certificate issued");
        Ok(certificate)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read Path
    // ─────────────────────────────────────────────────────────────────────────

    /// Verify a certificate by hash or id.
    ///
    /// `is_linked` is the forward-reference check: the block is genesis, or
    /// some later block names it as predecessor. The newest non-genesis
    /// block therefore reports `false` until it is superseded. Digests are
    /// not recomputed here; see [`Ledger::audit`].
    pub async fn verify(&self, lookup: impl Into<Lookup>) -> Result<VerificationResult> {
        let lookup = lookup.into();

        let anchored = self
            .store
            .find_certificate(&lookup)
            .await?
            .ok_or(LedgerError::NotFound(lookup))?;

        let chain_length = self.store.count_non_genesis_blocks().await?;

        let (is_linked, successors) = match self
            .store
            .get_block_by_hash(&anchored.certificate.hash)
            .await?
        {
            Some(block) => {
                let successors = self.store.count_successors(&block.current_hash).await?;
                (block.is_genesis() || successors > 0, successors)
            }
            // The join matched a moment ago; treat a vanished block as unlinked.
            None => (false, 0),
        };

        if successors > 1 {
            warn!(%lookup, successors, "certificate block has more than one successor");
        }

        let certificate = anchored.certificate;
        Ok(VerificationResult {
            id: certificate.id,
            subject: certificate.subject,
            qualifier: certificate.qualifier,
            issued_at: certificate.issued_at,
            record_hash: certificate.hash,
            previous_hash: anchored.previous_hash,
            block_timestamp: anchored.block_timestamp,
            chain_length,
            is_linked,
            is_valid: true,
            successors,
        })
    }

    /// Verify by a user-supplied hex hash.
    pub async fn verify_hash(&self, hash: &str) -> Result<VerificationResult> {
        let lookup = Lookup::parse_hash(hash)?;
        self.verify(lookup).await
    }

    /// All certificates, newest issuance first. No integrity checks.
    pub async fn list(&self) -> Result<Vec<Certificate>> {
        Ok(self.store.list_certificates().await?)
    }

    /// The most recently appended block.
    pub async fn tip(&self) -> Result<Option<Block>> {
        Ok(self.store.tip().await?)
    }

    /// Walk the whole chain, recomputing every digest and link.
    pub async fn audit(&self) -> Result<AuditReport> {
        let blocks = self.store.list_blocks().await?;
        let certificates = self.store.list_certificates().await?;

        let report = audit_chain(&blocks, &certificates);
        for issue in &report.issues {
            warn!(%issue, "chain inconsistency");
        }
        info!(
            blocks = report.blocks_checked,
            certificates = report.certificates_checked,
            issues = report.issues.len(),
            "chain audit finished"
        );
        Ok(report)
    }
}

/// The append protocol, run inside one store transaction.
///
/// `read_tip` is a tip read before the transaction opened; without one the
/// tip is read inside it. The block payload embeds the provisional hash;
/// the certificate row ends up with the block's digest.
fn link_certificate(
    tx: &mut dyn ChainTx,
    draft: DraftCertificate,
    read_tip: Option<PrevLink>,
) -> certchain_store::Result<Certificate> {
    let id = tx.insert_certificate(&draft)?;
    let provisional = draft.assign_id(id);

    let tip = match read_tip {
        Some(tip) => tip,
        None => tx.chain_tip()?,
    };
    let payload = provisional.canonical_payload()?;
    let block = NewBlock::seal(payload, tip, Timestamp::now());
    debug!(id = %id, previous = %block.previous_hash, hash = %block.current_hash, "sealed block");

    tx.insert_block(&block)?;
    tx.finalize_certificate(id, &block.current_hash)?;

    Ok(provisional.finalize(block.current_hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use certchain_core::RecordId;
    use certchain_store::MemoryStore;

    use crate::error::ErrorKind;

    fn ledger() -> Ledger<MemoryStore> {
        Ledger::new(MemoryStore::new(), LedgerConfig::default())
    }

    #[tokio::test]
    async fn test_append_rejects_empty_input() {
        let ledger = ledger();
        let err = ledger.append("", "Algorithms").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
        let err = ledger.append("Alice", "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);

        assert!(ledger.list().await.unwrap().is_empty());
        assert!(ledger.tip().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_block_payload_keeps_provisional_hash() {
        let ledger = ledger();
        let cert = ledger.append("Alice", "Algorithms").await.unwrap();
        let block = ledger.tip().await.unwrap().unwrap();

        assert_eq!(block.current_hash, cert.hash);
        let snapshot = block.certificate_payload().unwrap();
        assert_eq!(snapshot.certificate_id, cert.id);
        assert_eq!(snapshot.student, "Alice");
        assert_eq!(
            snapshot.certificate_hash,
            certchain_core::content_hash("Alice", "Algorithms", &cert.issued_at)
        );
        assert_ne!(snapshot.certificate_hash, cert.hash);
    }

    #[tokio::test]
    async fn test_verify_missing_id_is_not_found() {
        let ledger = ledger();
        ledger.append("Alice", "Algorithms").await.unwrap();
        let err = ledger.verify(RecordId(9)).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(Lookup::Id(RecordId(9)))));
    }

    #[tokio::test]
    async fn test_verify_hash_rejects_malformed_input() {
        let ledger = ledger();
        let err = ledger.verify_hash("xyz").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_serialized_policy_keeps_chain_linear() {
        let ledger = Arc::new(Ledger::new(
            MemoryStore::new(),
            LedgerConfig {
                append_policy: AppendPolicy::Serialized,
            },
        ));

        let mut handles = Vec::new();
        for i in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger
                    .append(&format!("Student {i}"), "Concurrency")
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let report = ledger.audit().await.unwrap();
        assert!(report.is_consistent(), "{:?}", report.issues);
        assert_eq!(report.blocks_checked, 8);

        let blocks = ledger.store().list_blocks().await.unwrap();
        assert_eq!(blocks[0].previous_hash, PrevLink::Genesis);
    }
}
