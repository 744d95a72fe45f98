//! Blockmania interpreter embedding.
//!
//! The interpreter consumes block-graph proposals for a round and emits a
//! totally ordered [`Interpreted`] batch once a block hash has been proposed
//! by a quorum of distinct nodes. Instances are built fresh per coordinator
//! batch and carry no state across batches; everything durable lives in the
//! block-graph store.
//!
//! A proposal's `deps` list is carried on the wire for interoperability but
//! is not consulted here: grouping and delivery are driven by
//! `(round, hash, node)` alone, and the coordinator only constructs an
//! instance once every proposal it will feed is already persisted.

use std::collections::{BTreeMap, HashMap, HashSet};
use tessera_types::{BlockGraph, Hash, Interpreted, InterpretedBlock, NodeId};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Interpreter configuration.
#[derive(Debug, Clone)]
pub struct BlockmaniaConfig {
    /// Highest round already interpreted; older proposals are ignored.
    pub last_interpreted: u64,
    /// Rounds to skip entirely.
    pub skip: Vec<u64>,
    /// The local node.
    pub node_id: NodeId,
    /// Number of distinct proposing nodes feeding this instance.
    pub node_count: usize,
}

impl BlockmaniaConfig {
    /// Byzantine quorum `2f + 1` with `f = ⌊(n - 1) / 3⌋`.
    pub fn quorum(&self) -> usize {
        2 * (self.node_count.saturating_sub(1) / 3) + 1
    }
}

/// One instance of the total-order interpreter.
pub struct Blockmania {
    config: BlockmaniaConfig,
    /// Open proposal groups: `(round, hash)` → proposing node → payload.
    groups: HashMap<(u64, Hash), BTreeMap<NodeId, Vec<u8>>>,
    /// Groups already delivered by this instance.
    delivered: HashSet<(u64, Hash)>,
    delivered_tx: mpsc::Sender<Interpreted>,
}

impl Blockmania {
    /// Build an instance that emits deliveries on `delivered_tx`.
    pub fn new(config: BlockmaniaConfig, delivered_tx: mpsc::Sender<Interpreted>) -> Self {
        Self {
            config,
            groups: HashMap::new(),
            delivered: HashSet::new(),
            delivered_tx,
        }
    }

    /// Feed one block-graph proposal into the instance.
    ///
    /// Delivery fires at the moment a `(round, hash)` group reaches quorum;
    /// later proposals for a delivered group are absorbed silently.
    pub async fn add(&mut self, bg: &BlockGraph) {
        let round = bg.block.round;
        if round <= self.config.last_interpreted {
            trace!(round, last = self.config.last_interpreted, "stale proposal ignored");
            return;
        }
        if self.config.skip.contains(&round) {
            trace!(round, "skipped round");
            return;
        }

        let key = (round, bg.block.hash);
        if self.delivered.contains(&key) {
            return;
        }

        let group = self.groups.entry(key).or_default();
        group.insert(bg.block.node, bg.block.data.clone());
        trace!(
            round,
            hash = %bg.block.hash,
            proposals = group.len(),
            quorum = self.config.quorum(),
            "proposal recorded"
        );

        if group.len() >= self.config.quorum() {
            self.deliver(key).await;
        }
    }

    async fn deliver(&mut self, key: (u64, Hash)) {
        let (round, hash) = key;
        let Some(group) = self.groups.remove(&key) else {
            return;
        };
        self.delivered.insert(key);

        // BTreeMap iteration gives the (round, node) total order.
        let blocks: Vec<InterpretedBlock> = group
            .into_iter()
            .map(|(node, data)| InterpretedBlock {
                hash,
                round,
                node,
                data,
            })
            .collect();

        debug!(round, %hash, tuples = blocks.len(), "quorum reached, delivering");
        if self
            .delivered_tx
            .send(Interpreted::new(round, blocks))
            .await
            .is_err()
        {
            warn!(round, "delivery receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::GraphSide;

    fn graph(hash: Hash, node: u64, round: u64) -> BlockGraph {
        BlockGraph::new(
            GraphSide::new(hash, NodeId(node), round, vec![node as u8]),
            GraphSide::new(Hash::digest(b"prev"), NodeId(node), round - 1, vec![]),
        )
    }

    fn config(node_count: usize) -> BlockmaniaConfig {
        BlockmaniaConfig {
            last_interpreted: 0,
            skip: vec![],
            node_id: NodeId(42),
            node_count,
        }
    }

    #[test]
    fn quorum_formula() {
        assert_eq!(config(1).quorum(), 1);
        assert_eq!(config(2).quorum(), 1);
        assert_eq!(config(4).quorum(), 3);
        assert_eq!(config(7).quorum(), 5);
        assert_eq!(config(10).quorum(), 7);
    }

    #[tokio::test]
    async fn delivers_at_quorum() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut bm = Blockmania::new(config(4), tx);
        let hash = Hash::digest(b"proposal");

        bm.add(&graph(hash, 1, 1)).await;
        bm.add(&graph(hash, 2, 1)).await;
        assert!(rx.try_recv().is_err());

        bm.add(&graph(hash, 3, 1)).await;
        let interpreted = rx.try_recv().unwrap();
        assert_eq!(interpreted.round, 1);
        assert_eq!(interpreted.blocks.len(), 3);
        // Ordered by node.
        let nodes: Vec<u64> = interpreted.blocks.iter().map(|b| b.node.0).collect();
        assert_eq!(nodes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn delivers_once_per_group() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut bm = Blockmania::new(config(2), tx);
        let hash = Hash::digest(b"once");

        bm.add(&graph(hash, 1, 1)).await;
        assert!(rx.try_recv().is_ok());

        bm.add(&graph(hash, 2, 1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn duplicate_node_counts_once() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut bm = Blockmania::new(config(4), tx);
        let hash = Hash::digest(b"dup");

        bm.add(&graph(hash, 1, 1)).await;
        bm.add(&graph(hash, 1, 1)).await;
        bm.add(&graph(hash, 1, 1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn ignores_interpreted_and_skipped_rounds() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut bm = Blockmania::new(
            BlockmaniaConfig {
                last_interpreted: 2,
                skip: vec![4],
                node_id: NodeId(42),
                node_count: 2,
            },
            tx,
        );
        let hash = Hash::digest(b"rounds");

        // At or below last_interpreted.
        bm.add(&graph(hash, 1, 2)).await;
        assert!(rx.try_recv().is_err());

        // Skipped.
        bm.add(&graph(hash, 1, 4)).await;
        assert!(rx.try_recv().is_err());

        // Fresh round delivers.
        bm.add(&graph(hash, 1, 3)).await;
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn deps_do_not_affect_grouping_or_delivery() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut bm = Blockmania::new(config(4), tx);
        let hash = Hash::digest(b"deps");

        // Proposals for the same (round, hash) with disjoint dependency
        // lists land in the same group.
        for node in 1..=3u64 {
            let mut bg = graph(hash, node, 1);
            bg.deps
                .push(GraphSide::new(Hash::digest(&node.to_le_bytes()), NodeId(node), 0, vec![]));
            bm.add(&bg).await;
        }

        let interpreted = rx.try_recv().unwrap();
        assert_eq!(interpreted.blocks.len(), 3);
        assert!(interpreted.blocks.iter().all(|b| b.hash == hash));
    }

    #[tokio::test]
    async fn distinct_hashes_form_distinct_groups() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut bm = Blockmania::new(config(4), tx);

        bm.add(&graph(Hash::digest(b"a"), 1, 1)).await;
        bm.add(&graph(Hash::digest(b"b"), 2, 1)).await;
        bm.add(&graph(Hash::digest(b"a"), 3, 1)).await;
        assert!(rx.try_recv().is_err());

        bm.add(&graph(Hash::digest(b"a"), 4, 1)).await;
        let interpreted = rx.try_recv().unwrap();
        assert_eq!(interpreted.blocks.len(), 3);
        assert!(interpreted
            .blocks
            .iter()
            .all(|b| b.hash == Hash::digest(b"a")));
    }
}
