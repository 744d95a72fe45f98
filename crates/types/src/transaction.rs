//! Ledger transactions.

use serde::{Deserialize, Serialize};

/// Length of a transaction identifier in bytes.
pub const TXN_ID_LEN: usize = 32;

/// A 32-byte transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxnId(pub [u8; TXN_ID_LEN]);

impl TxnId {
    pub fn as_bytes(&self) -> &[u8; TXN_ID_LEN] {
        &self.0
    }

    /// Parse from a byte slice; `None` if the length is not [`TXN_ID_LEN`].
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }
}

impl std::fmt::Display for TxnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A transaction carried in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Content identifier of the transaction.
    pub txn_id: TxnId,
    /// Opaque transaction payload.
    pub payload: Vec<u8>,
}

impl Transaction {
    pub fn new(txn_id: TxnId, payload: Vec<u8>) -> Self {
        Self { txn_id, payload }
    }
}
