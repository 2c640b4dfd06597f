//! The hash engine: SHA-256 digests with strong types.
//!
//! Every digest in the ledger is computed over the plain UTF-8
//! concatenation of field values, with no separators and no length
//! prefixes. Re-hashing the same text at verification time must reproduce
//! the stored digest bit for bit.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Text stored in `previous_hash` for the genesis block.
pub const GENESIS_SENTINEL: &str = "0";

/// A 32-byte SHA-256 digest.
///
/// Used both as the block linkage and as the external certificate
/// identifier handed to holders.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainHash(pub [u8; 32]);

impl ChainHash {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to lowercase hex, the storage and display encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex. Upper-case input is accepted.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for ChainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ChainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ChainHash {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s).map_err(|_| CoreError::InvalidHash(s.to_string()))
    }
}

impl AsRef<[u8]> for ChainHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for ChainHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for ChainHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ChainHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Hash arbitrary bytes.
pub fn digest(data: &[u8]) -> ChainHash {
    ChainHash(Sha256::digest(data).into())
}

/// Hash the concatenation of `parts` without materializing it.
pub fn digest_parts(parts: &[&[u8]]) -> ChainHash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    ChainHash(hasher.finalize().into())
}

/// A block's `previous_hash`.
///
/// The first block in the chain carries the sentinel `"0"` instead of a
/// digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrevLink {
    Genesis,
    Block(ChainHash),
}

impl PrevLink {
    /// The stored text form: `"0"` or lowercase hex.
    pub fn to_text(&self) -> String {
        match self {
            PrevLink::Genesis => GENESIS_SENTINEL.to_string(),
            PrevLink::Block(hash) => hash.to_hex(),
        }
    }

    /// Parse the stored text form.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if s == GENESIS_SENTINEL {
            Ok(PrevLink::Genesis)
        } else {
            s.parse().map(PrevLink::Block)
        }
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self, PrevLink::Genesis)
    }

    /// The predecessor's digest, if this is not the genesis link.
    pub fn hash(&self) -> Option<&ChainHash> {
        match self {
            PrevLink::Genesis => None,
            PrevLink::Block(hash) => Some(hash),
        }
    }
}

impl From<Option<ChainHash>> for PrevLink {
    fn from(tip: Option<ChainHash>) -> Self {
        tip.map_or(PrevLink::Genesis, PrevLink::Block)
    }
}

impl fmt::Debug for PrevLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrevLink::Genesis => f.write_str("Genesis"),
            PrevLink::Block(hash) => write!(f, "Block({:?})", hash),
        }
    }
}

impl fmt::Display for PrevLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl Serialize for PrevLink {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for PrevLink {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
