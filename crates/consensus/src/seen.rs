//! Seen-hash filter.
//!
//! Bounded set of recently rejected block hashes used to short-circuit
//! replays. Process-wide within a core instance; cleared on a periodic tick.

use crate::metrics;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Bounded set of lowercase-hex block hashes.
///
/// Many readers, occasional writers: the `add` path takes the read lock for
/// the membership test and re-checks under the write lock, so a concurrent
/// insert is never lost.
pub struct SeenHashFilter {
    hashes: RwLock<HashSet<String>>,
    capacity: usize,
}

impl SeenHashFilter {
    pub fn new(capacity: usize) -> Self {
        Self {
            hashes: RwLock::new(HashSet::new()),
            capacity,
        }
    }

    /// Whether the hash has been seen since the last flush.
    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.read().contains(hash)
    }

    /// Record a hash. No-op on duplicates; rejects once the filter is at
    /// capacity (the next flush tick frees it).
    pub fn add(&self, hash: &str) {
        if self.hashes.read().contains(hash) {
            return;
        }
        let mut hashes = self.hashes.write();
        if hashes.len() >= self.capacity {
            trace!(capacity = self.capacity, "seen-hash filter full, dropping");
            return;
        }
        hashes.insert(hash.to_ascii_lowercase());
        metrics::record_seen_hash_size(hashes.len());
    }

    /// Drop every recorded hash.
    pub fn clear(&self) {
        let mut hashes = self.hashes.write();
        hashes.clear();
        metrics::record_seen_hash_size(0);
    }

    pub fn len(&self) -> usize {
        self.hashes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.read().is_empty()
    }

    /// Spawn the periodic flush task. The filter is fully cleared on every
    /// tick until the token is cancelled.
    pub fn spawn_flush_task(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let filter = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The immediate first tick would clear an empty filter.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let dropped = filter.len();
                        filter.clear();
                        metrics::record_seen_hash_flush();
                        debug!(dropped, "seen-hash filter flushed");
                    }
                    _ = shutdown.cancelled() => {
                        trace!("seen-hash flush task stopped");
                        return;
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for SeenHashFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeenHashFilter")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
