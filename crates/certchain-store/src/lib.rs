//! # CertChain Store
//!
//! Storage abstraction for the CertChain ledger. Provides a trait-based
//! interface for certificate and block persistence with SQLite and
//! in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts persistence behind the [`Store`] trait,
//! allowing the ledger to be storage-agnostic. The primary implementation
//! is [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`ChainTx`] - Writes available inside one atomic transaction
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`AnchoredCertificate`] - A certificate joined to its owning block
//!
//! ## Usage
//!
//! ```rust,no_run
//! use certchain_store::{SqliteStore, Store};
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("certchain.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory().unwrap();
//!
//!     let blocks = store.list_blocks().await.unwrap();
//!     assert!(blocks.is_empty());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **All-or-nothing writes**: [`Store::atomically`] commits every write
//!   made through its [`ChainTx`] or none of them
//! - **No structural enforcement**: the store accepts a block on any tip;
//!   chain consistency is checked by readers, not enforced on write
//! - **Monotonic ids**: ids are never reused, so insertion id is chain order

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AnchoredCertificate, ChainTx, Store};
