//! Finalized chain store.

use crate::keys::{chain_key, META_LATEST_HEIGHT};
use crate::{run_blocking, CF_CHAIN, CF_TXINDEX};
use rocksdb::{IteratorMode, WriteBatch, DB};
use std::sync::Arc;
use tessera_types::{Block, Transaction, TxnId};
use tracing::error;

/// Durable append-only map of finalized blocks keyed by height.
///
/// A `txindex` column family maps transaction ids to the containing block's
/// height, written in the same batch as the block itself.
#[derive(Clone)]
pub struct ChainStore {
    db: Arc<DB>,
}

impl ChainStore {
    pub(crate) fn new(db: Arc<DB>) -> Self {
        Self { db }
    }

    /// Commit a finalized block. Returns `false` on storage failure.
    pub async fn put(&self, block: &Block) -> bool {
        let db = self.db.clone();
        let block = block.clone();
        run_blocking(move || put_blocking(&db, &block))
            .await
            .unwrap_or(false)
    }

    /// Fetch the block at a height.
    pub async fn get_by_height(&self, height: u64) -> Option<Block> {
        let db = self.db.clone();
        run_blocking(move || get_by_height_blocking(&db, height))
            .await
            .flatten()
    }

    /// Height of the latest finalized block, `None` on an empty chain.
    pub async fn latest_height(&self) -> Option<u64> {
        let db = self.db.clone();
        run_blocking(move || latest_height_blocking(&db))
            .await
            .flatten()
    }

    /// Number of finalized blocks. Heights are dense, so this is
    /// `latest_height + 1` on a non-empty chain.
    pub async fn count(&self) -> u64 {
        self.latest_height().await.map(|h| h + 1).unwrap_or(0)
    }

    /// Blocks in ascending height order, starting at height `skip`.
    pub async fn order_by_height(&self, skip: u64, take: usize) -> Vec<Block> {
        let db = self.db.clone();
        run_blocking(move || order_by_height_blocking(&db, skip, take))
            .await
            .unwrap_or_default()
    }

    /// Find the block and transaction for a transaction id.
    pub async fn where_tx(&self, txn_id: TxnId) -> Option<(Block, Transaction)> {
        let db = self.db.clone();
        run_blocking(move || where_tx_blocking(&db, txn_id))
            .await
            .flatten()
    }
}

fn put_blocking(db: &DB, block: &Block) -> bool {
    let cf = match db.cf_handle(CF_CHAIN) {
        Some(cf) => cf,
        None => {
            error!("chain column family not found");
            return false;
        }
    };
    let tx_cf = match db.cf_handle(CF_TXINDEX) {
        Some(cf) => cf,
        None => {
            error!("txindex column family not found");
            return false;
        }
    };

    let value = match bincode::serialize(block) {
        Ok(v) => v,
        Err(e) => {
            error!(height = block.height, "failed to encode block: {e}");
            return false;
        }
    };

    let mut batch = WriteBatch::default();
    batch.put_cf(cf, chain_key(block.height), value);
    for tx in &block.txs {
        batch.put_cf(tx_cf, tx.txn_id.as_bytes(), block.height.to_be_bytes());
    }

    let latest = latest_height_blocking(db);
    if latest.map_or(true, |h| block.height > h) {
        batch.put(META_LATEST_HEIGHT, block.height.to_be_bytes());
    }

    if let Err(e) = db.write(batch) {
        error!(height = block.height, "failed to commit block: {e}");
        return false;
    }
    true
}

fn get_by_height_blocking(db: &DB, height: u64) -> Option<Block> {
    let cf = db.cf_handle(CF_CHAIN)?;
    match db.get_cf(cf, chain_key(height)) {
        Ok(Some(value)) => match bincode::deserialize(&value) {
            Ok(block) => Some(block),
            Err(e) => {
                error!(height, "failed to decode block: {e}");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            error!(height, "failed to read block: {e}");
            None
        }
    }
}

fn latest_height_blocking(db: &DB) -> Option<u64> {
    match db.get(META_LATEST_HEIGHT) {
        Ok(Some(value)) => {
            let bytes: [u8; 8] = value.as_slice().try_into().ok()?;
            Some(u64::from_be_bytes(bytes))
        }
        Ok(None) => None,
        Err(e) => {
            error!("failed to read latest height: {e}");
            None
        }
    }
}

fn order_by_height_blocking(db: &DB, skip: u64, take: usize) -> Vec<Block> {
    let cf = match db.cf_handle(CF_CHAIN) {
        Some(cf) => cf,
        None => return Vec::new(),
    };

    let start = chain_key(skip);
    let iter = db.iterator_cf(cf, IteratorMode::From(&start, rocksdb::Direction::Forward));

    iter.take(take)
        .filter_map(|item| {
            item.ok()
                .and_then(|(_, value)| bincode::deserialize(&value).ok())
        })
        .collect()
}

fn where_tx_blocking(db: &DB, txn_id: TxnId) -> Option<(Block, Transaction)> {
    let tx_cf = db.cf_handle(CF_TXINDEX)?;
    let height = match db.get_cf(tx_cf, txn_id.as_bytes()) {
        Ok(Some(value)) => {
            let bytes: [u8; 8] = value.as_slice().try_into().ok()?;
            u64::from_be_bytes(bytes)
        }
        Ok(None) => return None,
        Err(e) => {
            error!(%txn_id, "failed to read tx index: {e}");
            return None;
        }
    };

    let block = get_by_height_blocking(db, height)?;
    let tx = block.txs.iter().find(|t| t.txn_id == txn_id)?.clone();
    Some((block, tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LedgerStore;
    use tempfile::TempDir;
    use tessera_types::{BlockPos, Hash};

    fn block_at(height: u64, prev: Hash, txns: &[u8]) -> Block {
        let txs = txns
            .iter()
            .map(|b| Transaction::new(TxnId([*b; 32]), vec![*b]))
            .collect();
        Block::new(
            height,
            prev,
            txs,
            BlockPos {
                public_key: vec![1; 32],
                solution: height * 10,
            },
        )
    }

    #[tokio::test]
    async fn put_and_get_by_height() {
        let temp_dir = TempDir::new().unwrap();
        let chain = LedgerStore::open(temp_dir.path()).unwrap().chain();

        assert!(chain.get_by_height(0).await.is_none());
        assert_eq!(chain.count().await, 0);

        let genesis = Block::genesis();
        assert!(chain.put(&genesis).await);
        assert_eq!(chain.get_by_height(0).await.unwrap(), genesis);
        assert_eq!(chain.count().await, 1);
        assert_eq!(chain.latest_height().await, Some(0));
    }

    #[tokio::test]
    async fn count_tracks_latest_height() {
        let temp_dir = TempDir::new().unwrap();
        let chain = LedgerStore::open(temp_dir.path()).unwrap().chain();

        let mut prev = Hash::zero();
        for h in 0..5 {
            let block = block_at(h, prev, &[]);
            prev = block.hash;
            assert!(chain.put(&block).await);
        }
        assert_eq!(chain.count().await, 5);
        assert_eq!(chain.latest_height().await, Some(4));
    }

    #[tokio::test]
    async fn order_by_height_ranges() {
        let temp_dir = TempDir::new().unwrap();
        let chain = LedgerStore::open(temp_dir.path()).unwrap().chain();

        for h in 0..10 {
            chain.put(&block_at(h, Hash::zero(), &[])).await;
        }

        let blocks = chain.order_by_height(3, 4).await;
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0].height, 3);
        assert_eq!(blocks[3].height, 6);

        // Past the end of the chain.
        assert!(chain.order_by_height(100, 5).await.is_empty());
    }

    #[tokio::test]
    async fn where_tx_finds_containing_block() {
        let temp_dir = TempDir::new().unwrap();
        let chain = LedgerStore::open(temp_dir.path()).unwrap().chain();

        chain.put(&block_at(0, Hash::zero(), &[])).await;
        let block = block_at(1, Hash::zero(), &[7, 8]);
        chain.put(&block).await;

        let (found_block, found_tx) = chain.where_tx(TxnId([8; 32])).await.unwrap();
        assert_eq!(found_block.height, 1);
        assert_eq!(found_tx.txn_id, TxnId([8; 32]));

        assert!(chain.where_tx(TxnId([99; 32])).await.is_none());
    }

    #[tokio::test]
    async fn put_same_height_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let chain = LedgerStore::open(temp_dir.path()).unwrap().chain();

        let a = block_at(2, Hash::digest(b"a"), &[]);
        let b = block_at(2, Hash::digest(b"b"), &[]);
        chain.put(&a).await;
        chain.put(&b).await;

        assert_eq!(chain.get_by_height(2).await.unwrap(), b);
        assert_eq!(chain.count().await, 3);
    }
}
