//! Blockmania coordinator.
//!
//! Reactive aggregator over block-graph completion events: groups events for
//! the current round by block hash, debounces each group, buffers closed
//! groups into batches, and drives a fresh interpreter instance per batch
//! once a quorum of distinct proposers is visible.
//!
//! Each per-hash group is one-shot: after its debounce window closes it,
//! further completions for that hash never reopen it. Batches reload the
//! whole round from the store, so late proposals still count there.

use crate::blockmania::{Blockmania, BlockmaniaConfig};
use crate::config::CoreConfig;
use crate::finalizer::Finalizer;
use crate::metrics;
use crate::round::RoundOracle;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tessera_storage::BlockGraphStore;
use tessera_types::{BlockGraph, Hash, NodeId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// Consumer of completion events; owner of the debounce and batch timers.
pub struct Coordinator {
    local_node: NodeId,
    graphs: BlockGraphStore,
    rounds: RoundOracle,
    finalizer: Arc<Finalizer>,
    completion_rx: mpsc::Receiver<BlockGraph>,
    config: CoreConfig,
}

impl Coordinator {
    pub fn new(
        local_node: NodeId,
        graphs: BlockGraphStore,
        rounds: RoundOracle,
        finalizer: Arc<Finalizer>,
        completion_rx: mpsc::Receiver<BlockGraph>,
        config: CoreConfig,
    ) -> Self {
        Self {
            local_node,
            graphs,
            rounds,
            finalizer,
            completion_rx,
            config,
        }
    }

    /// Start the coordinator task. On shutdown no further batches are
    /// emitted.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        let Coordinator {
            local_node,
            graphs,
            rounds,
            finalizer,
            completion_rx,
            config,
        } = self;
        let batcher = Batcher {
            local_node,
            graphs,
            rounds: rounds.clone(),
            finalizer,
        };
        tokio::spawn(run(batcher, rounds, completion_rx, config, shutdown))
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("local_node", &self.local_node)
            .finish_non_exhaustive()
    }
}

async fn run(
    batcher: Batcher,
    rounds: RoundOracle,
    mut completion_rx: mpsc::Receiver<BlockGraph>,
    config: CoreConfig,
    shutdown: CancellationToken,
) {
    // Open per-hash groups and their debounce deadlines. A new event for a
    // hash pushes its deadline out; the deadline passing closes the group.
    let mut groups: HashMap<Hash, Instant> = HashMap::new();
    // A hash's group fires at most once for the life of the subscription.
    // Completions for a hash whose group already closed are absorbed; their
    // proposals are picked up by the store reload of a later batch.
    let mut closed: HashSet<Hash> = HashSet::new();
    // Closed groups buffered until the batch window expires or the batch
    // fills.
    let mut pending: usize = 0;
    let mut batch_deadline: Option<Instant> = None;

    loop {
        let next_wake = groups.values().copied().chain(batch_deadline).min();

        tokio::select! {
            maybe = completion_rx.recv() => {
                match maybe {
                    Some(bg) => {
                        let next_round = rounds.next_round().await;
                        if bg.block.round != next_round {
                            trace!(
                                round = bg.block.round,
                                next_round,
                                "completion outside current round"
                            );
                            continue;
                        }
                        if closed.contains(&bg.block.hash) {
                            trace!(hash = %bg.block.hash, "group already closed, absorbing");
                            continue;
                        }
                        groups.insert(bg.block.hash, Instant::now() + config.debounce);
                    }
                    None => {
                        debug!("completion channel closed");
                        return;
                    }
                }
            }
            _ = async { sleep_until(next_wake.unwrap()).await }, if next_wake.is_some() => {}
            _ = shutdown.cancelled() => {
                trace!("coordinator stopped");
                return;
            }
        }

        let now = Instant::now();

        // Close every group whose debounce window elapsed.
        let expired: Vec<Hash> = groups
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(hash, _)| *hash)
            .collect();
        for hash in expired {
            groups.remove(&hash);
            closed.insert(hash);
            pending += 1;
            trace!(%hash, "group closed");
            if batch_deadline.is_none() {
                batch_deadline = Some(now + config.batch_window);
            }
        }

        let window_expired = batch_deadline.is_some_and(|deadline| deadline <= now);
        if pending > 0 && (window_expired || pending >= config.batch_max_items) {
            pending = 0;
            batch_deadline = None;
            batcher.run_batch().await;
        } else if pending == 0 {
            batch_deadline = None;
        }
    }
}

/// The store-reload and interpreter-construction half of the coordinator.
struct Batcher {
    local_node: NodeId,
    graphs: BlockGraphStore,
    rounds: RoundOracle,
    finalizer: Arc<Finalizer>,
}

impl Batcher {
    /// Reload the current round from the store and, at quorum, run one
    /// interpreter instance over it.
    async fn run_batch(&self) {
        let round = self.rounds.round().await;
        let next_round = self.rounds.next_round().await;

        let graphs = self.graphs.where_round(next_round).await;
        if graphs.len() < 2 {
            debug!(round = next_round, count = graphs.len(), "too few proposals");
            metrics::record_batch_skipped();
            return;
        }

        let node_count = graphs
            .iter()
            .map(|bg| bg.block.node)
            .collect::<HashSet<_>>()
            .len();
        let config = BlockmaniaConfig {
            last_interpreted: round,
            skip: Vec::new(),
            node_id: self.local_node,
            node_count,
        };
        let quorum = config.quorum();
        if node_count < quorum {
            debug!(round = next_round, node_count, quorum, "quorum not met");
            metrics::record_batch_skipped();
            return;
        }

        info!(
            round = next_round,
            node_count,
            quorum,
            proposals = graphs.len(),
            "running interpreter"
        );
        metrics::record_instance_built();

        let (delivered_tx, mut delivered_rx) = mpsc::channel(16);
        let mut interpreter = Blockmania::new(config, delivered_tx);

        let finalizer = self.finalizer.clone();
        let forward = tokio::spawn(async move {
            while let Some(interpreted) = delivered_rx.recv().await {
                finalizer.handle_delivery(interpreted).await;
            }
        });

        for bg in &graphs {
            interpreter.add(bg).await;
        }
        drop(interpreter);

        // A failure here abandons the batch; the coordinator keeps running.
        if let Err(e) = forward.await {
            error!(round = next_round, "interpreter delivery task failed: {e}");
        }
    }
}
