//! Block-graph proposals.
//!
//! A block-graph is a node's signed proposal that a given block belong to a
//! round, carrying the previous round's block for dependency tracking.

use crate::{Block, Hash, NodeId};
use serde::{Deserialize, Serialize};

/// One half of a block-graph: a `(hash, node, round)` position plus the
/// opaque serialized [`Block`] it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GraphSide {
    /// Hash the proposer assigned to this position.
    pub hash: Hash,
    /// Proposing node.
    pub node: NodeId,
    /// Consensus round this proposal targets.
    pub round: u64,
    /// Serialized [`Block`] payload. Empty on placeholder `prev` sides.
    pub data: Vec<u8>,
}

impl GraphSide {
    pub fn new(hash: Hash, node: NodeId, round: u64, data: Vec<u8>) -> Self {
        Self {
            hash,
            node,
            round,
            data,
        }
    }

    /// Deserialize the enclosed block, if any.
    pub fn block(&self) -> Result<Block, bincode::Error> {
        bincode::deserialize(&self.data)
    }
}

/// Deduplication identity of a block-graph: `(hash, node, round)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphIdentity {
    pub hash: Hash,
    pub node: NodeId,
    pub round: u64,
}

impl std::fmt::Display for GraphIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, r{})", self.hash, self.node, self.round)
    }
}

/// A node's proposal that a block belong to a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockGraph {
    /// The proposed position for the current round.
    pub block: GraphSide,
    /// The position of the previous round's block.
    pub prev: GraphSide,
    /// Co-signer public key.
    pub public_key: Vec<u8>,
    /// Co-signature over the canonical digest of `block | prev`.
    pub signature: Vec<u8>,
    /// Optional dependency list consumed by the interpreter.
    pub deps: Vec<GraphSide>,
}

impl BlockGraph {
    pub fn new(block: GraphSide, prev: GraphSide) -> Self {
        Self {
            block,
            prev,
            public_key: Vec::new(),
            signature: Vec::new(),
            deps: Vec::new(),
        }
    }

    /// Deduplication identity `(hash, node, round)`.
    pub fn identity(&self) -> GraphIdentity {
        GraphIdentity {
            hash: self.block.hash,
            node: self.block.node,
            round: self.block.round,
        }
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty() && !self.public_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlockPos, Transaction, TxnId};

    #[test]
    fn identity_tracks_block_side() {
        let bg = BlockGraph::new(
            GraphSide::new(Hash::digest(b"a"), NodeId(3), 7, vec![]),
            GraphSide::new(Hash::digest(b"b"), NodeId(3), 6, vec![]),
        );
        let id = bg.identity();
        assert_eq!(id.hash, Hash::digest(b"a"));
        assert_eq!(id.node, NodeId(3));
        assert_eq!(id.round, 7);
    }

    #[test]
    fn inner_block_round_trip() {
        let block = Block::new(
            2,
            Hash::digest(b"prev"),
            vec![Transaction::new(TxnId([1; 32]), vec![42])],
            BlockPos {
                public_key: vec![5; 32],
                solution: 99,
            },
        );
        let data = bincode::serialize(&block).unwrap();
        let side = GraphSide::new(block.hash, NodeId(1), 2, data);
        assert_eq!(side.block().unwrap(), block);
    }

    #[test]
    fn unsigned_by_default() {
        let bg = BlockGraph::new(GraphSide::default(), GraphSide::default());
        assert!(!bg.is_signed());
    }
}
