//! 32-byte content hash.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from hex decoding a hash.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HexError {
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    #[error("Expected 32 bytes, got {0}")]
    WrongLength(usize),
}

/// A 32-byte content hash.
///
/// Display and the `hex()` accessor render lowercase hex, which is the
/// canonical form used by the seen-hash filter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Hash([u8; 32]);

impl Hash {
    /// The all-zero hash (genesis predecessor).
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Wrap raw bytes as a hash. The bytes are used as-is, not hashed.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Compute the SHA-256 digest of `data`.
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string (case-insensitive).
    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        let bytes = hex::decode(s).map_err(|e| HexError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| HexError::WrongLength(bytes.len()))?;
        Ok(Self(arr))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hex())
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Truncated form keeps log lines readable.
        write!(f, "Hash({}..)", &self.hex()[..8])
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
