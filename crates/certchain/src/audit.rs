//! Full-chain audit.
//!
//! Unlike `verify`, the audit walks every block from genesis, recomputes
//! each digest, checks each `previous_hash` against the block before it,
//! and reports forks and certificates no block vouches for. It reports;
//! it never repairs.

use std::collections::{HashMap, HashSet};
use std::fmt;

use certchain_core::{Block, BlockId, Certificate, ChainHash, PrevLink, RecordId};
use serde::Serialize;

/// A single inconsistency found by [`audit_chain`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainIssue {
    /// The first block does not carry the genesis sentinel.
    MissingGenesis { block: BlockId },
    /// A later block carries the genesis sentinel.
    ExtraGenesis { block: BlockId },
    /// `previous_hash` differs from the preceding block's `current_hash`.
    BrokenLink {
        block: BlockId,
        expected: ChainHash,
        found: PrevLink,
    },
    /// Re-hashing the stored fields gives a different digest.
    HashMismatch {
        block: BlockId,
        stored: ChainHash,
        recomputed: ChainHash,
    },
    /// Several blocks claim the same predecessor.
    Fork {
        previous: ChainHash,
        blocks: Vec<BlockId>,
    },
    /// A certificate whose hash matches no block.
    UnanchoredCertificate { id: RecordId },
}

impl fmt::Display for ChainIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainIssue::MissingGenesis { block } => {
                write!(f, "first block {} is not a genesis block", block)
            }
            ChainIssue::ExtraGenesis { block } => {
                write!(f, "block {} claims to be a second genesis block", block)
            }
            ChainIssue::BrokenLink {
                block,
                expected,
                found,
            } => write!(
                f,
                "block {} links to {} but its predecessor is {}",
                block, found, expected
            ),
            ChainIssue::HashMismatch {
                block,
                stored,
                recomputed,
            } => write!(
                f,
                "block {} stores hash {} but its content hashes to {}",
                block, stored, recomputed
            ),
            ChainIssue::Fork { previous, blocks } => {
                write!(f, "blocks {:?} all extend {}", blocks, previous)
            }
            ChainIssue::UnanchoredCertificate { id } => {
                write!(f, "certificate {} is not anchored by any block", id)
            }
        }
    }
}

/// Outcome of a chain audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub blocks_checked: usize,
    pub certificates_checked: usize,
    pub issues: Vec<ChainIssue>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Audit `blocks` (in id order) and the certificates they should anchor.
pub fn audit_chain(blocks: &[Block], certificates: &[Certificate]) -> AuditReport {
    let mut issues = Vec::new();

    for (i, block) in blocks.iter().enumerate() {
        match (i, &block.previous_hash) {
            (0, PrevLink::Genesis) => {}
            (0, PrevLink::Block(_)) => {
                issues.push(ChainIssue::MissingGenesis { block: block.id });
            }
            (_, PrevLink::Genesis) => {
                issues.push(ChainIssue::ExtraGenesis { block: block.id });
            }
            (_, PrevLink::Block(prev)) => {
                let expected = blocks[i - 1].current_hash;
                if *prev != expected {
                    issues.push(ChainIssue::BrokenLink {
                        block: block.id,
                        expected,
                        found: block.previous_hash,
                    });
                }
            }
        }

        let recomputed = block.recompute_hash();
        if recomputed != block.current_hash {
            issues.push(ChainIssue::HashMismatch {
                block: block.id,
                stored: block.current_hash,
                recomputed,
            });
        }
    }

    issues.extend(find_forks(blocks));

    let anchored: HashSet<&ChainHash> = blocks.iter().map(|b| &b.current_hash).collect();
    let mut unanchored: Vec<RecordId> = certificates
        .iter()
        .filter(|c| !anchored.contains(&c.hash))
        .map(|c| c.id)
        .collect();
    unanchored.sort();
    issues.extend(
        unanchored
            .into_iter()
            .map(|id| ChainIssue::UnanchoredCertificate { id }),
    );

    AuditReport {
        blocks_checked: blocks.len(),
        certificates_checked: certificates.len(),
        issues,
    }
}

// Duplicate genesis blocks are reported as ExtraGenesis, not as a fork.
fn find_forks(blocks: &[Block]) -> Vec<ChainIssue> {
    let mut children: HashMap<ChainHash, Vec<BlockId>> = HashMap::new();
    for block in blocks {
        if let PrevLink::Block(prev) = block.previous_hash {
            children.entry(prev).or_default().push(block.id);
        }
    }

    let mut forks: Vec<ChainIssue> = children
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(previous, blocks)| ChainIssue::Fork { previous, blocks })
        .collect();
    forks.sort_by_key(|issue| match issue {
        ChainIssue::Fork { blocks, .. } => blocks[0],
        _ => BlockId(0),
    });
    forks
}
