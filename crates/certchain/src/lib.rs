//! # CertChain
//!
//! Issue tamper-evident certificates into an append-only, hash-chained
//! ledger and verify them later.
//!
//! ## Overview
//!
//! - **Hash engine**: SHA-256 over plain concatenated field text ([`core`])
//! - **Ledger writer**: [`Ledger::append`] inserts the certificate, seals a
//!   block on the current tip and finalizes the certificate hash, all in one
//!   transaction
//! - **Chain verifier**: [`Ledger::verify`] joins a certificate to its block
//!   and runs the forward-reference linkage check
//! - **Audit**: [`Ledger::audit`] walks the whole chain and recomputes every
//!   digest
//!
//! ## Key Concepts
//!
//! - **Genesis**: the first block, whose `previous_hash` is the sentinel `"0"`.
//! - **Tip**: the highest-id block; the next block links to it.
//! - **Linked**: genesis, or succeeded by at least one later block.
//! - **Finalization**: a certificate's durable hash is its block's digest; the
//!   block payload keeps the provisional content hash.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use certchain::{Ledger, LedgerConfig};
//! use certchain::store::SqliteStore;
//!
//! async fn example() {
//!     let store = SqliteStore::open("certchain.db").unwrap();
//!     let ledger = Ledger::new(store, LedgerConfig::default());
//!
//!     let cert = ledger.append("Alice", "Algorithms").await.unwrap();
//!     let result = ledger.verify(cert.hash).await.unwrap();
//!     assert!(result.is_valid);
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `certchain::core` - Core primitives (ChainHash, Certificate, Block, ...)
//! - `certchain::store` - Storage abstraction and SQLite

pub mod audit;
pub mod error;
pub mod ledger;

// Re-export component crates
pub use certchain_core as core;
pub use certchain_store as store;

// Re-export main types for convenience
pub use audit::{audit_chain, AuditReport, ChainIssue};
pub use error::{ErrorKind, LedgerError, Result};
pub use ledger::{AppendPolicy, Ledger, LedgerConfig};

// Re-export commonly used core types
pub use certchain_core::{
    Block, Certificate, ChainHash, Lookup, PrevLink, RecordId, Timestamp, VerificationResult,
};
