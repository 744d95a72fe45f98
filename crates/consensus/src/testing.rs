//! In-memory collaborator implementations for tests.
//!
//! The gossip transport, validator and signer are external subsystems; these
//! stand-ins give tests deterministic, observable behavior without real
//! networking or key management.

use crate::traits::{
    BroadcastError, Broadcaster, Peer, PeerProvider, Signer, SignerError, Validator, VerifyStatus,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tessera_messages::Topic;
use tessera_storage::ChainStore;
use tessera_types::{Block, BlockGraph, Hash, NodeId};

/// Fixed peer set.
pub struct StaticPeerProvider {
    peers: HashMap<NodeId, Peer>,
}

impl StaticPeerProvider {
    pub fn empty() -> Self {
        Self {
            peers: HashMap::new(),
        }
    }

    /// `count` peers with node ids `1..=count`.
    pub fn with_count(count: usize) -> Self {
        let peers = (1..=count as u64)
            .map(|id| {
                (
                    NodeId(id),
                    Peer {
                        host: format!("peer-{id}.test:7946"),
                        public_key: vec![id as u8; 32],
                        node_name: format!("peer-{id}"),
                        block_height: None,
                    },
                )
            })
            .collect();
        Self { peers }
    }
}

#[async_trait]
impl PeerProvider for StaticPeerProvider {
    async fn peers(&self) -> HashMap<NodeId, Peer> {
        self.peers.clone()
    }
}

/// Records every dispatched broadcast.
#[derive(Default)]
pub struct RecordingBroadcaster {
    sent: Mutex<Vec<(Topic, Vec<u8>)>>,
    peers_seen: Mutex<Vec<HashMap<NodeId, Peer>>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn sent(&self) -> Vec<(Topic, Vec<u8>)> {
        self.sent.lock().clone()
    }

    /// Peer set passed to the most recent broadcast.
    pub fn last_peers(&self) -> Option<HashMap<NodeId, Peer>> {
        self.peers_seen.lock().last().cloned()
    }
}

#[async_trait]
impl Broadcaster for RecordingBroadcaster {
    async fn broadcast(
        &self,
        peers: HashMap<NodeId, Peer>,
        topic: Topic,
        payload: Vec<u8>,
    ) -> Result<(), BroadcastError> {
        self.peers_seen.lock().push(peers);
        self.sent.lock().push((topic, payload));
        Ok(())
    }
}

/// Validator backed by the chain store.
///
/// Existence checks consult the chain; signature checks accept any graph
/// that carries a signature and public key. Set `reject_blocks` to fail
/// full block verification.
pub struct ChainValidator {
    chain: ChainStore,
    reject_blocks: bool,
}

impl ChainValidator {
    pub fn new(chain: ChainStore) -> Self {
        Self {
            chain,
            reject_blocks: false,
        }
    }

    pub fn rejecting_blocks(chain: ChainStore) -> Self {
        Self {
            chain,
            reject_blocks: true,
        }
    }
}

#[async_trait]
impl Validator for ChainValidator {
    async fn verify_block(&self, block: &Block) -> VerifyStatus {
        if self.reject_blocks {
            return VerifyStatus::UnableToVerify;
        }
        match self.block_exists(block).await {
            VerifyStatus::AlreadyExists => VerifyStatus::AlreadyExists,
            _ if !block.hash_matches() => VerifyStatus::UnableToVerify,
            _ => VerifyStatus::Succeed,
        }
    }

    async fn block_exists(&self, block: &Block) -> VerifyStatus {
        match self.chain.get_by_height(block.height).await {
            Some(stored) if stored.hash == block.hash => VerifyStatus::AlreadyExists,
            _ => VerifyStatus::Succeed,
        }
    }

    async fn verify_blockgraph_sig(&self, bg: &BlockGraph) -> VerifyStatus {
        if bg.is_signed() {
            VerifyStatus::Succeed
        } else {
            VerifyStatus::UnableToVerify
        }
    }
}

/// Deterministic signer producing recognizable pseudo-signatures.
#[derive(Default)]
pub struct StubSigner {
    keys: Mutex<HashMap<String, u8>>,
}

impl StubSigner {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Signer for StubSigner {
    async fn get_or_upsert_key(&self, name: &str) -> Result<(), SignerError> {
        let mut keys = self.keys.lock();
        let next = keys.len() as u8 + 1;
        keys.entry(name.to_string()).or_insert(next);
        Ok(())
    }

    async fn sign(&self, name: &str, digest: Hash) -> Result<Vec<u8>, SignerError> {
        let seed = *self
            .keys
            .lock()
            .get(name)
            .ok_or_else(|| SignerError::UnknownKey(name.to_string()))?;
        let mut signature = digest.as_bytes().to_vec();
        signature.extend_from_slice(&[seed; 32]);
        Ok(signature)
    }

    async fn public_key(&self, name: &str) -> Result<Vec<u8>, SignerError> {
        let seed = *self
            .keys
            .lock()
            .get(name)
            .ok_or_else(|| SignerError::UnknownKey(name.to_string()))?;
        Ok(vec![seed; 32])
    }
}
