//! Signing message construction.
//!
//! Domain separation prevents a co-signature over a block-graph from being
//! replayed as any other kind of signature.

use crate::{BlockGraph, Hash};

/// Domain tag for block-graph co-signatures.
pub const DOMAIN_BLOCK_GRAPH: &[u8] = b"tessera/block-graph/v1:";

/// Canonical digest of a block-graph for co-signing.
///
/// Covers `block.hash || block.node || block.round || prev.hash ||
/// prev.round` under [`DOMAIN_BLOCK_GRAPH`]. Integers are little-endian.
/// The signature and public key fields are deliberately excluded.
pub fn block_graph_digest(bg: &BlockGraph) -> Hash {
    let mut message = Vec::with_capacity(DOMAIN_BLOCK_GRAPH.len() + 32 + 8 + 8 + 32 + 8);
    message.extend_from_slice(DOMAIN_BLOCK_GRAPH);
    message.extend_from_slice(bg.block.hash.as_bytes());
    message.extend_from_slice(&bg.block.node.0.to_le_bytes());
    message.extend_from_slice(&bg.block.round.to_le_bytes());
    message.extend_from_slice(bg.prev.hash.as_bytes());
    message.extend_from_slice(&bg.prev.round.to_le_bytes());
    Hash::digest(&message)
}
