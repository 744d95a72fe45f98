//! Finalizer.
//!
//! Consumes interpreter deliveries: verifies each delivered block-graph,
//! stages its block to the delivered store, then deterministically picks the
//! round winner and commits it to the chain. Stale scratch records are
//! garbage-collected after every delivery, whether or not a winner emerged.

use crate::metrics;
use crate::round::RoundOracle;
use crate::seen::SeenHashFilter;
use crate::traits::{Validator, VerifyStatus};
use std::sync::Arc;
use tessera_storage::{BlockGraphStore, ChainStore, DeliveredStore};
use tessera_types::{Block, Interpreted};
use tracing::{debug, info, warn};

/// Turns ordered deliveries into chain commits.
pub struct Finalizer {
    chain: ChainStore,
    graphs: BlockGraphStore,
    delivered: DeliveredStore,
    seen: Arc<SeenHashFilter>,
    rounds: RoundOracle,
    validator: Arc<dyn Validator>,
}

impl Finalizer {
    pub fn new(
        chain: ChainStore,
        graphs: BlockGraphStore,
        delivered: DeliveredStore,
        seen: Arc<SeenHashFilter>,
        rounds: RoundOracle,
        validator: Arc<dyn Validator>,
    ) -> Self {
        Self {
            chain,
            graphs,
            delivered,
            seen,
            rounds,
            validator,
        }
    }

    /// Handle one interpreter delivery, then run winner selection and
    /// garbage collection. Winner selection runs even when every tuple was
    /// skipped.
    pub async fn handle_delivery(&self, interpreted: Interpreted) {
        debug!(
            round = interpreted.round,
            tuples = interpreted.blocks.len(),
            "handling delivery"
        );

        for tuple in &interpreted.blocks {
            if tuple.data.is_empty() {
                continue;
            }

            let next_round = self.rounds.next_round().await;
            let Some(bg) = self.graphs.get_by_hash_round(tuple.hash, next_round).await else {
                warn!(hash = %tuple.hash, round = next_round, "delivered block-graph not in store");
                continue;
            };

            let block = match bg.block.block() {
                Ok(block) => block,
                Err(e) => {
                    warn!(identity = %bg.identity(), "undecodable delivered payload: {e}");
                    continue;
                }
            };

            if self.validator.block_exists(&block).await == VerifyStatus::AlreadyExists {
                debug!(height = block.height, hash = %block.hash, "block already finalized");
                self.seen.add(&block.hash.hex());
                self.delivered.remove(block.hash).await;
                self.graphs
                    .remove(bg.block.hash, bg.block.node, bg.block.round)
                    .await;
                continue;
            }

            if self.validator.verify_blockgraph_sig(&bg).await != VerifyStatus::Succeed {
                warn!(identity = %bg.identity(), "delivered block-graph failed verification");
                self.graphs
                    .remove(bg.block.hash, bg.block.node, bg.block.round)
                    .await;
                continue;
            }

            if self.delivered.put(&block).await {
                metrics::record_delivered();
            }
        }

        self.select_winner().await;
        self.garbage_collect().await;
    }

    /// Deterministic pick over the delivered store for the next height.
    async fn select_winner(&self) {
        let height = self.rounds.round().await;
        if self.chain.get_by_height(height).await.is_none() {
            return;
        }

        let candidates = self.delivered.where_height(height + 1).await;
        if candidates.is_empty() {
            return;
        }

        let min_solution = candidates
            .iter()
            .map(|b| b.block_pos.solution)
            .min()
            .expect("non-empty candidate set");
        let max_solution = candidates
            .iter()
            .map(|b| b.block_pos.solution)
            .max()
            .expect("non-empty candidate set");
        let winners: Vec<&Block> = candidates
            .iter()
            .filter(|b| b.block_pos.solution == min_solution)
            .collect();

        let winner = if winners.len() > 2 {
            // A wide tie only resolves for a minimal solution that also
            // exceeds the overall maximum, which never holds; such rounds
            // produce no winner.
            winners
                .iter()
                .find(|b| b.block_pos.solution > max_solution)
                .copied()
        } else {
            winners.first().copied()
        };

        let Some(winner) = winner else {
            debug!(height = height + 1, ties = winners.len(), "no winner this cycle");
            return;
        };

        if self.validator.block_exists(winner).await == VerifyStatus::AlreadyExists {
            self.seen.add(&winner.hash.hex());
            return;
        }
        match self.validator.verify_block(winner).await {
            VerifyStatus::Succeed => {
                if self.chain.put(winner).await {
                    metrics::record_committed(winner.height);
                    info!(height = winner.height, hash = %winner.hash, "round winner committed");
                }
            }
            VerifyStatus::AlreadyExists => {
                self.seen.add(&winner.hash.hex());
            }
            VerifyStatus::UnableToVerify => {
                warn!(height = winner.height, hash = %winner.hash, "winner failed verification");
                self.seen.add(&winner.hash.hex());
            }
        }
    }

    /// Drop delivered blocks and block-graphs that fell behind the current
    /// round.
    async fn garbage_collect(&self) {
        let next_round = self.rounds.next_round().await;
        let delivered = self.delivered.remove_where_height_lt(next_round).await;
        let graphs = self.graphs.remove_where_round_lt(next_round).await;
        if delivered > 0 || graphs > 0 {
            debug!(delivered, graphs, next_round, "scratch stores pruned");
        }
    }
}
