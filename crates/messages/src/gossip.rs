//! Gossip message wrappers.

use crate::NetworkMessage;
use serde::{Deserialize, Serialize};
use tessera_types::BlockGraph;

/// Broadcasts a co-signed block-graph proposal to peers.
///
/// Receiving nodes gate the proposal by round and feed it into their own
/// ingress queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockGraphGossip {
    /// The block-graph being broadcast.
    pub block_graph: BlockGraph,
}

impl BlockGraphGossip {
    pub fn new(block_graph: BlockGraph) -> Self {
        Self { block_graph }
    }

    /// Get the inner block-graph.
    pub fn block_graph(&self) -> &BlockGraph {
        &self.block_graph
    }

    /// Consume and return the inner block-graph.
    pub fn into_block_graph(self) -> BlockGraph {
        self.block_graph
    }
}

impl NetworkMessage for BlockGraphGossip {
    fn message_type_id() -> &'static str {
        "block_graph.add"
    }
}
