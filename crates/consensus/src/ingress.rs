//! Block-graph ingress.
//!
//! Single-writer entry point for candidate block-graphs, fed by both remote
//! peers (via gossip) and the local block producer. Submissions are processed
//! strictly one at a time by a single consumer task, which is what permits
//! per-identity read-modify-write on the block-graph store without locking.
//!
//! Per submission the sequence persist → broadcast → completion-event is
//! strict; nothing else preempts a submission mid-finalization.

use crate::metrics;
use crate::round::RoundOracle;
use crate::seen::SeenHashFilter;
use crate::traits::{Broadcaster, PeerProvider, Signer, SignerError, Validator, VerifyStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tessera_messages::{encode_block_graph, BlockGraphGossip, Topic};
use tessera_storage::{BlockGraphStore, DeliveredStore};
use tessera_types::{block_graph_digest, Block, BlockGraph, Hash, NodeId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Cheap handle for submitting block-graphs into the ingress queue.
#[derive(Clone)]
pub struct IngressHandle {
    tx: mpsc::Sender<BlockGraph>,
}

impl IngressHandle {
    /// Enqueue a candidate block-graph. Returns `false` if the core is
    /// shutting down.
    pub async fn submit(&self, bg: BlockGraph) -> bool {
        metrics::record_ingested();
        self.tx.send(bg).await.is_ok()
    }
}

/// The ingress worker. Construct, replay persisted state, then [`spawn`].
///
/// [`spawn`]: BlockGraphIngress::spawn
pub struct BlockGraphIngress {
    local_node: NodeId,
    graphs: BlockGraphStore,
    delivered: DeliveredStore,
    seen: Arc<SeenHashFilter>,
    rounds: RoundOracle,
    peer_provider: Arc<dyn PeerProvider>,
    broadcaster: Arc<dyn Broadcaster>,
    validator: Arc<dyn Validator>,
    signer: Arc<dyn Signer>,
    completion_tx: mpsc::Sender<BlockGraph>,
    key_name: String,
    key_ready: AtomicBool,
}

impl BlockGraphIngress {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        local_node: NodeId,
        graphs: BlockGraphStore,
        delivered: DeliveredStore,
        seen: Arc<SeenHashFilter>,
        rounds: RoundOracle,
        peer_provider: Arc<dyn PeerProvider>,
        broadcaster: Arc<dyn Broadcaster>,
        validator: Arc<dyn Validator>,
        signer: Arc<dyn Signer>,
        completion_tx: mpsc::Sender<BlockGraph>,
        key_name: String,
    ) -> Self {
        Self {
            local_node,
            graphs,
            delivered,
            seen,
            rounds,
            peer_provider,
            broadcaster,
            validator,
            signer,
            completion_tx,
            key_name,
            key_ready: AtomicBool::new(false),
        }
    }

    /// Fire completion events for every persisted block-graph of the current
    /// round. Called once on startup; restores coordinator state after a
    /// crash without re-signing or re-broadcasting.
    pub async fn replay_current_round(&self) {
        let next_round = self.rounds.next_round().await;
        let graphs = self.graphs.where_round(next_round).await;
        if graphs.is_empty() {
            return;
        }
        info!(
            count = graphs.len(),
            round = next_round,
            "replaying persisted block-graphs"
        );
        for bg in graphs {
            self.complete(bg).await;
        }
    }

    /// Start the single consumer task.
    ///
    /// On shutdown the in-flight submission drains; queued submissions are
    /// dropped.
    pub fn spawn(
        self,
        queue_depth: usize,
        shutdown: CancellationToken,
    ) -> (IngressHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(queue_depth);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    maybe = rx.recv() => match maybe {
                        Some(bg) => self.process(bg).await,
                        None => break,
                    },
                    _ = shutdown.cancelled() => {
                        trace!("ingress task stopped");
                        break;
                    }
                }
            }
        });
        (IngressHandle { tx }, task)
    }

    /// Process one submission to completion.
    async fn process(&self, bg: BlockGraph) {
        let block = match bg.block.block() {
            Ok(block) => block,
            Err(e) => {
                warn!(identity = %bg.identity(), "undecodable block payload: {e}");
                metrics::record_rejected();
                return;
            }
        };

        if self.seen.contains(&block.hash.hex()) {
            debug!(hash = %block.hash, "block hash already seen, purging");
            self.delivered.remove(block.hash).await;
            self.graphs
                .remove(bg.block.hash, bg.block.node, bg.block.round)
                .await;
            metrics::record_rejected();
            return;
        }

        let next_round = self.rounds.next_round().await;
        match self.graphs.get(bg.block.hash, bg.block.node, next_round).await {
            Some(saved) => {
                // The round conjunct can never hold for a record this lookup
                // returns, so a matching identity always drops as duplicate.
                if saved.public_key != block.block_pos.public_key
                    && saved.block.round != next_round
                {
                    self.finalize(bg, &block).await;
                } else {
                    debug!(identity = %bg.identity(), "duplicate block-graph dropped");
                    metrics::record_rejected();
                }
            }
            None if bg.block.round == next_round => self.finalize(bg, &block).await,
            None => {
                debug!(
                    identity = %bg.identity(),
                    next_round,
                    "block-graph outside current round"
                );
                metrics::record_rejected();
            }
        }
    }

    /// Co-sign, persist, rebroadcast and announce a block-graph.
    async fn finalize(&self, mut bg: BlockGraph, inner: &Block) {
        let copy = bg.block.node != self.local_node;
        if copy {
            if self.validator.verify_blockgraph_sig(&bg).await == VerifyStatus::UnableToVerify {
                warn!(identity = %bg.identity(), "unverifiable co-signature, dropping");
                metrics::record_rejected();
                return;
            }
            if !self.graphs.put(&bg).await {
                return;
            }
            metrics::record_persisted();

            // Local co-signed copy: same payloads, our node id, the round
            // pinned to the enclosed block's height.
            let mut local = bg.clone();
            local.block.node = self.local_node;
            local.block.round = inner.height;
            local.block.hash = Hash::digest(&inner.height.to_le_bytes());
            local.signature.clear();
            local.public_key.clear();

            if let Err(e) = self.sign(&mut local).await {
                warn!(identity = %local.identity(), "co-signing failed: {e}");
                return;
            }
            if !self.graphs.put(&local).await {
                return;
            }
            metrics::record_persisted();
            self.broadcast(&local).await;
            self.complete(bg).await;
        } else {
            if self
                .graphs
                .get(bg.block.hash, bg.block.node, bg.block.round)
                .await
                .is_some()
            {
                self.complete(bg).await;
                return;
            }
            if let Err(e) = self.sign(&mut bg).await {
                warn!(identity = %bg.identity(), "signing failed: {e}");
                return;
            }
            if !self.graphs.put(&bg).await {
                return;
            }
            metrics::record_persisted();
            self.broadcast(&bg).await;
            self.complete(bg).await;
        }
    }

    /// Sign under the well-known key, initializing it on first use.
    async fn sign(&self, bg: &mut BlockGraph) -> Result<(), SignerError> {
        if !self.key_ready.load(Ordering::Acquire) {
            self.signer.get_or_upsert_key(&self.key_name).await?;
            self.key_ready.store(true, Ordering::Release);
        }
        let digest = block_graph_digest(bg);
        bg.signature = self.signer.sign(&self.key_name, digest).await?;
        bg.public_key = self.signer.public_key(&self.key_name).await?;
        Ok(())
    }

    /// Best-effort fan-out to the current peer set.
    async fn broadcast(&self, bg: &BlockGraph) {
        let mut peers = self.peer_provider.peers().await;
        if peers.is_empty() {
            info!(identity = %bg.identity(), "no peers to broadcast block-graph to");
            return;
        }
        for peer in peers.values_mut() {
            peer.block_height = Some(bg.block.round);
        }

        let payload = match encode_block_graph(&BlockGraphGossip::new(bg.clone())) {
            Ok(payload) => payload,
            Err(e) => {
                error!(identity = %bg.identity(), "failed to encode block-graph: {e}");
                return;
            }
        };

        match self
            .broadcaster
            .broadcast(peers, Topic::AddBlockGraph, payload)
            .await
        {
            Ok(()) => metrics::record_broadcast(),
            Err(e) => warn!(identity = %bg.identity(), "broadcast failed: {e}"),
        }
    }

    async fn complete(&self, bg: BlockGraph) {
        if self.completion_tx.send(bg).await.is_err() {
            warn!("completion channel closed");
        }
    }
}
