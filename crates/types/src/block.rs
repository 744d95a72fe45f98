//! Finalized chain blocks.

use crate::{Hash, Transaction};
use serde::{Deserialize, Serialize};

/// Proof-of-stake witness attached to a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockPos {
    /// Public key of the staker that produced the solution.
    pub public_key: Vec<u8>,
    /// Proof-of-stake solution. Round winners are chosen by minimum solution.
    pub solution: u64,
}

/// The replicated chain unit.
///
/// Invariants: `height` equals the predecessor's `height + 1`, `hash` is the
/// digest of the serialized body, and the chain store holds at most one block
/// per height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Dense, monotonic height starting at 0.
    pub height: u64,
    /// Content hash of the block body.
    pub hash: Hash,
    /// Hash of the predecessor block.
    pub previous_hash: Hash,
    /// Ordered transactions.
    pub txs: Vec<Transaction>,
    /// Proof-of-stake witness.
    pub block_pos: BlockPos,
}

/// The hashed portion of a block, everything except the hash itself.
#[derive(Serialize)]
struct BlockBody<'a> {
    height: u64,
    previous_hash: &'a Hash,
    txs: &'a [Transaction],
    block_pos: &'a BlockPos,
}

impl Block {
    /// Build a block, computing its content hash from the body.
    pub fn new(
        height: u64,
        previous_hash: Hash,
        txs: Vec<Transaction>,
        block_pos: BlockPos,
    ) -> Self {
        let mut block = Self {
            height,
            hash: Hash::zero(),
            previous_hash,
            txs,
            block_pos,
        };
        block.hash = block.compute_hash();
        block
    }

    /// The genesis block: height 0, zero predecessor, no transactions.
    pub fn genesis() -> Self {
        Self::new(0, Hash::zero(), Vec::new(), BlockPos::default())
    }

    /// Digest of the serialized block body (excluding `hash`).
    pub fn compute_hash(&self) -> Hash {
        let body = BlockBody {
            height: self.height,
            previous_hash: &self.previous_hash,
            txs: &self.txs,
            block_pos: &self.block_pos,
        };
        let encoded = bincode::serialize(&body).expect("block body serialization is infallible");
        Hash::digest(&encoded)
    }

    /// Whether the stored hash matches the body.
    pub fn hash_matches(&self) -> bool {
        self.hash == self.compute_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TxnId;

    fn sample_block(height: u64, solution: u64) -> Block {
        let tx = Transaction::new(TxnId([7u8; 32]), vec![1, 2, 3]);
        Block::new(
            height,
            Hash::digest(b"prev"),
            vec![tx],
            BlockPos {
                public_key: vec![9; 32],
                solution,
            },
        )
    }

    #[test]
    fn hash_covers_body() {
        let a = sample_block(1, 10);
        let b = sample_block(1, 10);
        assert_eq!(a.hash, b.hash);

        let c = sample_block(1, 11);
        assert_ne!(a.hash, c.hash);
        assert!(a.hash_matches());
    }

    #[test]
    fn tampering_breaks_hash() {
        let mut block = sample_block(3, 5);
        block.height = 4;
        assert!(!block.hash_matches());
    }

    #[test]
    fn genesis_shape() {
        let genesis = Block::genesis();
        assert_eq!(genesis.height, 0);
        assert!(genesis.previous_hash.is_zero());
        assert!(genesis.txs.is_empty());
        assert!(genesis.hash_matches());
    }
}
