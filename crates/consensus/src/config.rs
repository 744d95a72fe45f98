//! Core configuration.

use std::time::Duration;

/// Debounce window for grouping block-graph completions by hash.
pub const BLOCKMANIA_DEBOUNCE: Duration = Duration::from_millis(1500);
/// Window over which closed groups are buffered into one batch.
pub const BATCH_BUFFER_WINDOW: Duration = Duration::from_secs(1);
/// Maximum closed groups per batch.
pub const BATCH_MAX_ITEMS: usize = 500;
/// Bounded cardinality of the seen-hash filter.
pub const SEEN_HASH_CAPACITY: usize = 50_000;
/// Interval at which the seen-hash filter is fully cleared.
pub const SEEN_HASH_FLUSH: Duration = Duration::from_secs(60 * 60);
/// Number of trailing blocks returned by the safeguard query.
pub const SAFEGUARD_WINDOW: u64 = 147;

/// Well-known signer key name for block-graph co-signatures.
pub const SIGNER_KEY_NAME: &str = "tessera.blockgraph";

/// Tunables for the consensus core.
///
/// Defaults match the protocol constants; tests shrink the timing windows.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Silence window that closes a per-hash completion group.
    pub debounce: Duration,
    /// Buffering window for closed groups before a batch is emitted.
    pub batch_window: Duration,
    /// Maximum closed groups per batch.
    pub batch_max_items: usize,
    /// Seen-hash filter capacity.
    pub seen_capacity: usize,
    /// Seen-hash filter flush interval.
    pub seen_flush_interval: Duration,
    /// Depth of the ingress submission queue.
    pub ingress_queue_depth: usize,
    /// Depth of the completion channel feeding the coordinator.
    pub completion_queue_depth: usize,
    /// Signer key name used for co-signatures.
    pub signer_key_name: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            debounce: BLOCKMANIA_DEBOUNCE,
            batch_window: BATCH_BUFFER_WINDOW,
            batch_max_items: BATCH_MAX_ITEMS,
            seen_capacity: SEEN_HASH_CAPACITY,
            seen_flush_interval: SEEN_HASH_FLUSH,
            ingress_queue_depth: 1024,
            completion_queue_depth: 1024,
            signer_key_name: SIGNER_KEY_NAME.to_string(),
        }
    }
}
