//! Certificates and their two-phase hash lifecycle.
//!
//! A certificate's hash is assigned twice. At creation it carries a
//! provisional content hash over `subject ‖ qualifier ‖ issued_at`; that
//! value is embedded in the block payload. Once the block exists the
//! durable hash is overwritten with the block's `current_hash`.
//!
//! The lifecycle is expressed as types:
//!
//! ```text
//! IssueRequest ──draft()──▶ DraftCertificate ──assign_id()──▶ ProvisionalCertificate ──finalize()──▶ Certificate
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, ValidationError};
use crate::hash::{digest_parts, ChainHash};
use crate::types::{RecordId, Timestamp};

/// Validated input for issuing a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRequest {
    subject: String,
    qualifier: String,
}

impl IssueRequest {
    /// Validate the two required fields. Whitespace-only counts as empty.
    pub fn new(
        subject: impl Into<String>,
        qualifier: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let subject = subject.into();
        let qualifier = qualifier.into();
        if subject.trim().is_empty() {
            return Err(ValidationError::EmptyField("subject"));
        }
        if qualifier.trim().is_empty() {
            return Err(ValidationError::EmptyField("qualifier"));
        }
        Ok(Self { subject, qualifier })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    /// Stamp the request with its issuance time and provisional hash.
    pub fn draft(self, issued_at: Timestamp) -> DraftCertificate {
        let provisional_hash = content_hash(&self.subject, &self.qualifier, &issued_at);
        DraftCertificate {
            subject: self.subject,
            qualifier: self.qualifier,
            issued_at,
            provisional_hash,
        }
    }
}

/// Content hash over `subject ‖ qualifier ‖ issued_at`.
pub fn content_hash(subject: &str, qualifier: &str, issued_at: &Timestamp) -> ChainHash {
    digest_parts(&[
        subject.as_bytes(),
        qualifier.as_bytes(),
        issued_at.to_canonical().as_bytes(),
    ])
}

/// A certificate that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftCertificate {
    pub subject: String,
    pub qualifier: String,
    pub issued_at: Timestamp,
    pub provisional_hash: ChainHash,
}

impl DraftCertificate {
    /// Attach the id the store assigned to the inserted row.
    pub fn assign_id(self, id: RecordId) -> ProvisionalCertificate {
        ProvisionalCertificate {
            id,
            subject: self.subject,
            qualifier: self.qualifier,
            issued_at: self.issued_at,
            provisional_hash: self.provisional_hash,
        }
    }
}

/// A persisted certificate whose durable hash is still the provisional one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionalCertificate {
    pub id: RecordId,
    pub subject: String,
    pub qualifier: String,
    pub issued_at: Timestamp,
    pub provisional_hash: ChainHash,
}

impl ProvisionalCertificate {
    /// Snapshot embedded in the block.
    pub fn payload(&self) -> CertificatePayload {
        CertificatePayload {
            certificate_id: self.id,
            student: self.subject.clone(),
            course: self.qualifier.clone(),
            issued_date: self.issued_at,
            certificate_hash: self.provisional_hash,
        }
    }

    /// Canonical payload text, i.e. the block's `data` column.
    pub fn canonical_payload(&self) -> Result<String, CoreError> {
        self.payload().to_canonical()
    }

    /// Replace the provisional hash with the owning block's digest.
    pub fn finalize(self, block_hash: ChainHash) -> Certificate {
        Certificate {
            id: self.id,
            subject: self.subject,
            qualifier: self.qualifier,
            issued_at: self.issued_at,
            hash: block_hash,
        }
    }
}

/// The certificate snapshot stored in a block.
///
/// Field order is part of the canonical encoding; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificatePayload {
    pub certificate_id: RecordId,
    pub student: String,
    pub course: String,
    pub issued_date: Timestamp,
    pub certificate_hash: ChainHash,
}

impl CertificatePayload {
    /// Compact JSON, fields in declaration order.
    pub fn to_canonical(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_canonical(s: &str) -> Result<Self, CoreError> {
        serde_json::from_str(s).map_err(|e| CoreError::Encoding(e.to_string()))
    }
}

/// A finalized certificate as it is durably stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: RecordId,
    pub subject: String,
    pub qualifier: String,
    pub issued_at: Timestamp,
    /// Equal to the owning block's `current_hash`.
    pub hash: ChainHash,
}
