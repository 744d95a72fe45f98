//! Operations exposed by the core to the host (RPC fronting, sync, local
//! block producer).

use crate::ingress::IngressHandle;
use crate::round::RoundOracle;
use crate::seen::SeenHashFilter;
use crate::traits::SubmitStatus;
use std::sync::Arc;
use tessera_messages::{decode_block_graph, Topic};
use tessera_storage::LedgerStore;
use tessera_types::{Block, BlockGraph, Hash, Transaction, TxnId};
use tracing::debug;

/// Handle to the running consensus core.
#[derive(Clone)]
pub struct ConsensusCore {
    store: LedgerStore,
    seen: Arc<SeenHashFilter>,
    rounds: RoundOracle,
    ingress: IngressHandle,
    safeguard_window: u64,
}

impl ConsensusCore {
    pub fn new(store: LedgerStore, seen: Arc<SeenHashFilter>, ingress: IngressHandle) -> Self {
        let rounds = RoundOracle::new(store.chain());
        Self {
            store,
            seen,
            rounds,
            ingress,
            safeguard_window: crate::config::SAFEGUARD_WINDOW,
        }
    }

    /// The finalized block at a height.
    pub async fn get_block(&self, height: u64) -> Option<Block> {
        self.store.chain().get_by_height(height).await
    }

    /// Finalized blocks in height order, starting at height `skip`.
    pub async fn get_blocks(&self, skip: u64, take: usize) -> Vec<Block> {
        self.store.chain().order_by_height(skip, take).await
    }

    /// The trailing safeguard window of the chain, clamped at height 0.
    pub async fn get_safeguard_blocks(&self) -> Vec<Block> {
        let count = self.store.chain().count().await;
        let skip = count.saturating_sub(self.safeguard_window);
        self.store
            .chain()
            .order_by_height(skip, self.safeguard_window as usize)
            .await
    }

    /// Height of the latest finalized block; 0 on a fresh chain.
    pub async fn get_height(&self) -> u64 {
        self.store.chain().latest_height().await.unwrap_or(0)
    }

    /// Height and hash of a finalized block. Height 0 selects the latest
    /// block; heights past the tip return `None`.
    pub async fn get_hash(&self, height: u64) -> Option<(u64, Hash)> {
        let latest = self.store.chain().latest_height().await?;
        let target = if height == 0 { latest } else { height };
        if target > latest {
            return None;
        }
        self.store
            .chain()
            .get_by_height(target)
            .await
            .map(|block| (block.height, block.hash))
    }

    /// A finalized transaction by its 32-byte id.
    pub async fn get_transaction(&self, txn_id: &[u8]) -> Option<Transaction> {
        let txn_id = TxnId::from_slice(txn_id)?;
        self.store.chain().where_tx(txn_id).await.map(|(_, tx)| tx)
    }

    /// Enqueue a candidate block-graph from the local producer or a decoded
    /// gossip message.
    pub async fn submit_block_graph(&self, bg: BlockGraph) -> bool {
        self.ingress.submit(bg).await
    }

    /// Decode and enqueue a gossip payload.
    pub async fn submit_block_graph_bytes(&self, bytes: &[u8]) -> SubmitStatus {
        let bg = match decode_block_graph(&Topic::AddBlockGraph.to_string(), bytes) {
            Ok(bg) => bg,
            Err(e) => {
                debug!("rejecting undecodable block-graph payload: {e}");
                return SubmitStatus::Invalid;
            }
        };
        if self.block_graph_exists(&bg).await == SubmitStatus::AlreadyExists {
            return SubmitStatus::AlreadyExists;
        }
        if self.ingress.submit(bg).await {
            SubmitStatus::Succeed
        } else {
            SubmitStatus::Invalid
        }
    }

    /// Whether a block-graph with this identity is already persisted.
    pub async fn block_graph_exists(&self, bg: &BlockGraph) -> SubmitStatus {
        let existing = self
            .store
            .block_graphs()
            .get(bg.block.hash, bg.block.node, bg.block.round)
            .await;
        if existing.is_some() {
            SubmitStatus::AlreadyExists
        } else {
            SubmitStatus::Succeed
        }
    }

    /// Current consensus round.
    pub async fn round(&self) -> u64 {
        self.rounds.round().await
    }

    /// The seen-hash filter shared with the running tasks.
    pub fn seen(&self) -> &Arc<SeenHashFilter> {
        &self.seen
    }

    /// The underlying store.
    pub fn store(&self) -> &LedgerStore {
        &self.store
    }
}

impl std::fmt::Debug for ConsensusCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusCore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingress::BlockGraphIngress;
    use crate::testing::{ChainValidator, RecordingBroadcaster, StaticPeerProvider, StubSigner};
    use tempfile::TempDir;
    use tessera_messages::{encode_block_graph, BlockGraphGossip};
    use tessera_types::{BlockPos, GraphSide, NodeId};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    async fn core_with_chain(blocks: u64) -> (ConsensusCore, TempDir, CancellationToken) {
        let temp = TempDir::new().unwrap();
        let store = LedgerStore::open(temp.path()).unwrap();
        let seen = Arc::new(SeenHashFilter::new(1000));

        let mut prev = Block::genesis();
        store.chain().put(&prev).await;
        for height in 1..=blocks {
            let block = Block::new(
                height,
                prev.hash,
                vec![Transaction::new(TxnId([height as u8; 32]), vec![height as u8])],
                BlockPos {
                    public_key: vec![1; 32],
                    solution: height,
                },
            );
            store.chain().put(&block).await;
            prev = block;
        }

        let (completion_tx, _completion_rx) = mpsc::channel(16);
        let ingress = BlockGraphIngress::new(
            NodeId(42),
            store.block_graphs(),
            store.delivered(),
            seen.clone(),
            RoundOracle::new(store.chain()),
            Arc::new(StaticPeerProvider::empty()),
            Arc::new(RecordingBroadcaster::new()),
            Arc::new(ChainValidator::new(store.chain())),
            Arc::new(StubSigner::new()),
            completion_tx,
            "tessera.blockgraph".to_string(),
        );
        let shutdown = CancellationToken::new();
        let (handle, _task) = ingress.spawn(16, shutdown.clone());

        let core = ConsensusCore::new(store, seen, handle);
        (core, temp, shutdown)
    }

    #[tokio::test]
    async fn get_hash_zero_means_latest() {
        let (core, _temp, _shutdown) = core_with_chain(5).await;

        let (height, hash) = core.get_hash(0).await.unwrap();
        assert_eq!(height, 5);
        assert_eq!(hash, core.get_block(5).await.unwrap().hash);

        let (height, _) = core.get_hash(3).await.unwrap();
        assert_eq!(height, 3);

        assert!(core.get_hash(6).await.is_none());
    }

    #[tokio::test]
    async fn safeguard_short_chain_returns_all() {
        let (core, _temp, _shutdown) = core_with_chain(4).await;

        let blocks = core.get_safeguard_blocks().await;
        assert_eq!(blocks.len(), 5);
        assert_eq!(blocks[0].height, 0);
        assert_eq!(blocks[4].height, 4);
    }

    #[tokio::test]
    async fn get_transaction_by_id() {
        let (core, _temp, _shutdown) = core_with_chain(3).await;

        let tx = core.get_transaction(&[2; 32]).await.unwrap();
        assert_eq!(tx.txn_id, TxnId([2; 32]));
        assert!(core.get_transaction(&[200; 32]).await.is_none());
        // Anything but 32 bytes is not a transaction id.
        assert!(core.get_transaction(&[2; 16]).await.is_none());
    }

    #[tokio::test]
    async fn submit_bytes_statuses() {
        let (core, _temp, _shutdown) = core_with_chain(0).await;

        assert_eq!(
            core.submit_block_graph_bytes(&[0xde, 0xad]).await,
            SubmitStatus::Invalid
        );

        let block = Block::new(1, Block::genesis().hash, vec![], BlockPos::default());
        let data = bincode::serialize(&block).unwrap();
        let bg = BlockGraph::new(
            GraphSide::new(block.hash, NodeId(42), 1, data),
            GraphSide::new(Block::genesis().hash, NodeId(42), 0, vec![]),
        );
        let payload = encode_block_graph(&BlockGraphGossip::new(bg.clone())).unwrap();

        assert_eq!(
            core.submit_block_graph_bytes(&payload).await,
            SubmitStatus::Succeed
        );

        // Wait for the ingress task to persist it, then resubmission reports
        // the existing record.
        for _ in 0..100 {
            if core.block_graph_exists(&bg).await == SubmitStatus::AlreadyExists {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(
            core.submit_block_graph_bytes(&payload).await,
            SubmitStatus::AlreadyExists
        );
    }

    #[tokio::test]
    async fn height_and_round_track_chain() {
        let (core, _temp, _shutdown) = core_with_chain(2).await;
        assert_eq!(core.get_height().await, 2);
        assert_eq!(core.round().await, 2);
    }
}
