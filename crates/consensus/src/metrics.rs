//! Consensus metrics using the native Prometheus client.
//!
//! Metrics are domain-specific rather than generic event counters; use traces
//! for event-level granularity during investigations.

use prometheus::{register_counter, register_gauge, Counter, Gauge};
use std::sync::OnceLock;

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Domain-specific metrics for the consensus core.
pub struct Metrics {
    // === Ingress ===
    pub blockgraphs_ingested: Counter,
    pub blockgraphs_persisted: Counter,
    pub blockgraphs_rejected: Counter,
    pub blockgraphs_broadcast: Counter,

    // === Coordinator ===
    pub blockmania_instances: Counter,
    pub batches_skipped: Counter,

    // === Finalizer ===
    pub blocks_delivered: Counter,
    pub blocks_committed: Counter,
    pub chain_height: Gauge,

    // === Seen-hash filter ===
    pub seen_hash_size: Gauge,
    pub seen_hash_flushes: Counter,
}

impl Metrics {
    fn new() -> Self {
        Self {
            blockgraphs_ingested: register_counter!(
                "tessera_blockgraphs_ingested_total",
                "Block-graphs accepted into the ingress queue"
            )
            .unwrap(),
            blockgraphs_persisted: register_counter!(
                "tessera_blockgraphs_persisted_total",
                "Block-graphs persisted to the scratch store"
            )
            .unwrap(),
            blockgraphs_rejected: register_counter!(
                "tessera_blockgraphs_rejected_total",
                "Block-graphs dropped as duplicate, stale or unverifiable"
            )
            .unwrap(),
            blockgraphs_broadcast: register_counter!(
                "tessera_blockgraphs_broadcast_total",
                "Block-graphs fanned out to peers"
            )
            .unwrap(),
            blockmania_instances: register_counter!(
                "tessera_blockmania_instances_total",
                "Interpreter instances constructed"
            )
            .unwrap(),
            batches_skipped: register_counter!(
                "tessera_batches_skipped_total",
                "Coordinator batches skipped below quorum"
            )
            .unwrap(),
            blocks_delivered: register_counter!(
                "tessera_blocks_delivered_total",
                "Blocks staged to the delivered store"
            )
            .unwrap(),
            blocks_committed: register_counter!(
                "tessera_blocks_committed_total",
                "Round winners committed to the chain"
            )
            .unwrap(),
            chain_height: register_gauge!(
                "tessera_chain_height",
                "Height of the latest finalized block"
            )
            .unwrap(),
            seen_hash_size: register_gauge!(
                "tessera_seen_hash_size",
                "Current cardinality of the seen-hash filter"
            )
            .unwrap(),
            seen_hash_flushes: register_counter!(
                "tessera_seen_hash_flushes_total",
                "Seen-hash filter flush ticks"
            )
            .unwrap(),
        }
    }
}

/// Global metrics accessor.
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

pub fn record_ingested() {
    metrics().blockgraphs_ingested.inc();
}

pub fn record_persisted() {
    metrics().blockgraphs_persisted.inc();
}

pub fn record_rejected() {
    metrics().blockgraphs_rejected.inc();
}

pub fn record_broadcast() {
    metrics().blockgraphs_broadcast.inc();
}

pub fn record_instance_built() {
    metrics().blockmania_instances.inc();
}

pub fn record_batch_skipped() {
    metrics().batches_skipped.inc();
}

pub fn record_delivered() {
    metrics().blocks_delivered.inc();
}

pub fn record_committed(height: u64) {
    metrics().blocks_committed.inc();
    metrics().chain_height.set(height as f64);
}

pub fn record_seen_hash_size(size: usize) {
    metrics().seen_hash_size.set(size as f64);
}

pub fn record_seen_hash_flush() {
    metrics().seen_hash_flushes.inc();
}
