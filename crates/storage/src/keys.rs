//! Key construction for the column families.
//!
//! Heights and rounds are big-endian so lexicographic key order matches
//! numeric order, which makes range scans natural.

use tessera_types::{Hash, NodeId};

/// Latest finalized height, stored in the default column family.
pub const META_LATEST_HEIGHT: &[u8] = b"chain:latest_height";

/// Chain key: height as big-endian bytes.
pub fn chain_key(height: u64) -> [u8; 8] {
    height.to_be_bytes()
}

/// Block-graph key: `round | hash | node`.
pub fn graph_key(round: u64, hash: &Hash, node: NodeId) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + 32 + 8);
    key.extend_from_slice(&round.to_be_bytes());
    key.extend_from_slice(hash.as_bytes());
    key.extend_from_slice(&node.0.to_be_bytes());
    key
}

/// Prefix of all block-graph keys for a round.
pub fn graph_round_prefix(round: u64) -> [u8; 8] {
    round.to_be_bytes()
}

/// Prefix of all block-graph keys for a `(round, hash)` pair.
pub fn graph_hash_prefix(round: u64, hash: &Hash) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(8 + 32);
    prefix.extend_from_slice(&round.to_be_bytes());
    prefix.extend_from_slice(hash.as_bytes());
    prefix
}

/// Round component of a block-graph key.
pub fn graph_key_round(key: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = key.get(..8)?.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Hash component of a block-graph key.
pub fn graph_key_hash(key: &[u8]) -> Option<Hash> {
    let bytes: [u8; 32] = key.get(8..40)?.try_into().ok()?;
    Some(Hash::from_bytes(bytes))
}
