//! Collaborator contracts consumed by the core.
//!
//! The gossip transport, block validator, and signing service are external
//! subsystems; the core sees them only through these traits and receives them
//! as injected `Arc<dyn …>` handles.

use async_trait::async_trait;
use std::collections::HashMap;
use tessera_types::{Block, BlockGraph, Hash, NodeId};
use thiserror::Error;

/// Outcome of validator checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStatus {
    /// The check passed.
    Succeed,
    /// The subject is already present (treated as a success path).
    AlreadyExists,
    /// The subject could not be verified.
    UnableToVerify,
}

/// Outcome of a block-graph submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    Succeed,
    AlreadyExists,
    Invalid,
}

/// A known peer, as reported by the membership layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub host: String,
    pub public_key: Vec<u8>,
    pub node_name: String,
    /// Round annotation set by the sender so receivers can gate by round.
    pub block_height: Option<u64>,
}

/// Provides the current peer set. Must exclude the local node.
#[async_trait]
pub trait PeerProvider: Send + Sync {
    async fn peers(&self) -> HashMap<NodeId, Peer>;
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("Dispatch failed: {0}")]
    Dispatch(String),
}

/// Best-effort fan-out to a set of peers.
///
/// Returns when dispatch is scheduled; per-peer failures are the
/// implementation's concern.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(
        &self,
        peers: HashMap<NodeId, Peer>,
        topic: tessera_messages::Topic,
        payload: Vec<u8>,
    ) -> Result<(), BroadcastError>;
}

/// Cryptographic and chain-membership checks over blocks and block-graphs.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Full verification of a candidate block (signatures, PoS witness,
    /// linkage).
    async fn verify_block(&self, block: &Block) -> VerifyStatus;

    /// Whether the chain already contains this block by identity.
    async fn block_exists(&self, block: &Block) -> VerifyStatus;

    /// Verify a block-graph's node/round co-signature.
    async fn verify_blockgraph_sig(&self, bg: &BlockGraph) -> VerifyStatus;
}

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Unknown key: {0}")]
    UnknownKey(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Key management and signing, keyed by well-known key names.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Ensure a key exists for `name`, creating it if necessary.
    async fn get_or_upsert_key(&self, name: &str) -> Result<(), SignerError>;

    /// Sign a digest under the named key.
    async fn sign(&self, name: &str, digest: Hash) -> Result<Vec<u8>, SignerError>;

    /// Public key for the named key.
    async fn public_key(&self, name: &str) -> Result<Vec<u8>, SignerError>;
}
