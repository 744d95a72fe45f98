//! # Ledger Storage
//!
//! RocksDB-backed persistence for the consensus core: the finalized chain,
//! the block-graph scratch store, and the delivered-block scratch store.
//!
//! RocksDB I/O is blocking; every public operation is async and hops onto the
//! blocking thread pool internally so the executor is never stalled. Store
//! failures are logged at error level and surface as `false`/`None`/empty to
//! the caller; nothing at this layer panics on I/O.

mod blockgraphs;
mod chain;
mod delivered;
mod keys;

pub use blockgraphs::BlockGraphStore;
pub use chain::ChainStore;
pub use delivered::DeliveredStore;

use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Column family holding the finalized chain, keyed by big-endian height.
pub(crate) const CF_CHAIN: &str = "chain";
/// Column family mapping transaction id to block height.
pub(crate) const CF_TXINDEX: &str = "txindex";
/// Column family holding pending block-graphs, keyed by `round | hash | node`.
pub(crate) const CF_BLOCKGRAPHS: &str = "blockgraphs";
/// Column family holding delivered-but-unchosen blocks, keyed by block hash.
pub(crate) const CF_DELIVERED: &str = "delivered";

/// Error type for storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),
}

/// Configuration for the RocksDB instance.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of background jobs.
    pub max_background_jobs: i32,
    /// Write buffer size in bytes.
    pub write_buffer_size: usize,
    /// Number of log files to keep.
    pub keep_log_file_num: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_background_jobs: 4,
            write_buffer_size: 64 * 1024 * 1024,
            keep_log_file_num: 10,
        }
    }
}

/// Handle to the opened database. Cheap to clone.
#[derive(Clone)]
pub struct LedgerStore {
    db: Arc<DB>,
}

impl LedgerStore {
    /// Open or create the database at the given path with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Open with custom configuration.
    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        config: StoreConfig,
    ) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_background_jobs(config.max_background_jobs);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_keep_log_file_num(config.keep_log_file_num);

        let cf_descriptors: Vec<_> = [CF_CHAIN, CF_TXINDEX, CF_BLOCKGRAPHS, CF_DELIVERED]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Handle to the finalized chain.
    pub fn chain(&self) -> ChainStore {
        ChainStore::new(self.db.clone())
    }

    /// Handle to the block-graph scratch store.
    pub fn block_graphs(&self) -> BlockGraphStore {
        BlockGraphStore::new(self.db.clone())
    }

    /// Handle to the delivered-block scratch store.
    pub fn delivered(&self) -> DeliveredStore {
        DeliveredStore::new(self.db.clone())
    }
}

impl std::fmt::Debug for LedgerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerStore").finish_non_exhaustive()
    }
}

/// Run a blocking storage closure on the blocking pool.
///
/// A panicked task is logged and mapped to `None`; callers translate that to
/// their own failure value.
pub(crate) async fn run_blocking<T, F>(f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!("storage task failed: {e}");
            None
        }
    }
}
