//! # CertChain Core
//!
//! Pure primitives for CertChain: digests, certificates, blocks and their
//! canonical encoding.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over the ledger's data structures.
//!
//! ## Key Types
//!
//! - [`ChainHash`] - 256-bit SHA-256 digest, the ledger's only identifier of content
//! - [`PrevLink`] - A block's `previous_hash`: the genesis sentinel or a digest
//! - [`Certificate`] - A finalized, durable certificate
//! - [`Block`] - An immutable ledger entry wrapping a certificate snapshot
//! - [`Lookup`] - How a caller names a certificate: by hash or by id
//!
//! ## Hashing
//!
//! All digests are computed over plain UTF-8 concatenation of field values
//! with no separators. See the [`hash`] module.

pub mod block;
pub mod certificate;
pub mod error;
pub mod hash;
pub mod types;
pub mod verification;

pub use block::{block_hash, Block, NewBlock};
pub use certificate::{
    content_hash, Certificate, CertificatePayload, DraftCertificate, IssueRequest,
    ProvisionalCertificate,
};
pub use error::{CoreError, ValidationError};
pub use hash::{digest, digest_parts, ChainHash, PrevLink, GENESIS_SENTINEL};
pub use types::{BlockId, RecordId, Timestamp};
pub use verification::{Lookup, VerificationResult};
