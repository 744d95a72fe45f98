//! Delivered-block scratch store.

use crate::{run_blocking, CF_DELIVERED};
use rocksdb::{IteratorMode, WriteBatch, DB};
use std::sync::Arc;
use tessera_types::{Block, Hash};
use tracing::error;

/// Blocks promoted by the interpreter but not yet chosen as round winner,
/// keyed by block hash.
#[derive(Clone)]
pub struct DeliveredStore {
    db: Arc<DB>,
}

impl DeliveredStore {
    pub(crate) fn new(db: Arc<DB>) -> Self {
        Self { db }
    }

    /// Stage a delivered block. Returns `false` on failure.
    pub async fn put(&self, block: &Block) -> bool {
        let db = self.db.clone();
        let block = block.clone();
        run_blocking(move || put_blocking(&db, &block))
            .await
            .unwrap_or(false)
    }

    /// Fetch a delivered block by hash.
    pub async fn get(&self, hash: Hash) -> Option<Block> {
        let db = self.db.clone();
        run_blocking(move || get_blocking(&db, hash)).await.flatten()
    }

    /// All delivered blocks at a height.
    pub async fn where_height(&self, height: u64) -> Vec<Block> {
        let db = self.db.clone();
        run_blocking(move || where_height_blocking(&db, height))
            .await
            .unwrap_or_default()
    }

    /// Remove a delivered block by hash. Returns `false` on failure.
    pub async fn remove(&self, hash: Hash) -> bool {
        let db = self.db.clone();
        run_blocking(move || remove_blocking(&db, hash))
            .await
            .unwrap_or(false)
    }

    /// Remove every delivered block below a height. Returns the number
    /// removed.
    pub async fn remove_where_height_lt(&self, height: u64) -> usize {
        let db = self.db.clone();
        run_blocking(move || remove_where_height_lt_blocking(&db, height))
            .await
            .unwrap_or(0)
    }
}

fn put_blocking(db: &DB, block: &Block) -> bool {
    let cf = match db.cf_handle(CF_DELIVERED) {
        Some(cf) => cf,
        None => {
            error!("delivered column family not found");
            return false;
        }
    };
    let value = match bincode::serialize(block) {
        Ok(v) => v,
        Err(e) => {
            error!(height = block.height, "failed to encode delivered block: {e}");
            return false;
        }
    };
    if let Err(e) = db.put_cf(cf, block.hash.as_bytes(), value) {
        error!(height = block.height, "failed to store delivered block: {e}");
        return false;
    }
    true
}

fn get_blocking(db: &DB, hash: Hash) -> Option<Block> {
    let cf = db.cf_handle(CF_DELIVERED)?;
    match db.get_cf(cf, hash.as_bytes()) {
        Ok(Some(value)) => bincode::deserialize(&value).ok(),
        Ok(None) => None,
        Err(e) => {
            error!(%hash, "failed to read delivered block: {e}");
            None
        }
    }
}

fn where_height_blocking(db: &DB, height: u64) -> Vec<Block> {
    scan(db)
        .into_iter()
        .filter(|block| block.height == height)
        .collect()
}

fn remove_blocking(db: &DB, hash: Hash) -> bool {
    let cf = match db.cf_handle(CF_DELIVERED) {
        Some(cf) => cf,
        None => return false,
    };
    match db.delete_cf(cf, hash.as_bytes()) {
        Ok(()) => true,
        Err(e) => {
            error!(%hash, "failed to remove delivered block: {e}");
            false
        }
    }
}

fn remove_where_height_lt_blocking(db: &DB, height: u64) -> usize {
    let cf = match db.cf_handle(CF_DELIVERED) {
        Some(cf) => cf,
        None => return 0,
    };

    let mut batch = WriteBatch::default();
    let mut removed = 0usize;
    for block in scan(db) {
        if block.height < height {
            batch.delete_cf(cf, block.hash.as_bytes());
            removed += 1;
        }
    }

    if let Err(e) = db.write(batch) {
        error!(height, "failed to prune delivered blocks: {e}");
        return 0;
    }
    removed
}

/// The delivered set is small (at most one round's worth of candidates), so
/// a full scan is the simplest correct query.
fn scan(db: &DB) -> Vec<Block> {
    let cf = match db.cf_handle(CF_DELIVERED) {
        Some(cf) => cf,
        None => return Vec::new(),
    };
    db.iterator_cf(cf, IteratorMode::Start)
        .filter_map(|item| {
            item.ok()
                .and_then(|(_, value)| bincode::deserialize(&value).ok())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LedgerStore;
    use tempfile::TempDir;
    use tessera_types::BlockPos;

    fn block(height: u64, tag: &[u8], solution: u64) -> Block {
        Block::new(
            height,
            Hash::digest(tag),
            vec![],
            BlockPos {
                public_key: vec![2; 32],
                solution,
            },
        )
    }

    #[tokio::test]
    async fn put_get_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = LedgerStore::open(temp_dir.path()).unwrap().delivered();

        let b = block(1, b"a", 10);
        assert!(store.put(&b).await);
        assert_eq!(store.get(b.hash).await.unwrap(), b);

        assert!(store.remove(b.hash).await);
        assert!(store.get(b.hash).await.is_none());
    }

    #[tokio::test]
    async fn keyed_by_hash_not_height() {
        let temp_dir = TempDir::new().unwrap();
        let store = LedgerStore::open(temp_dir.path()).unwrap().delivered();

        store.put(&block(2, b"a", 10)).await;
        store.put(&block(2, b"b", 11)).await;
        store.put(&block(3, b"c", 12)).await;

        let at_two = store.where_height(2).await;
        assert_eq!(at_two.len(), 2);
        assert!(store.where_height(4).await.is_empty());
    }

    #[tokio::test]
    async fn prune_below_height() {
        let temp_dir = TempDir::new().unwrap();
        let store = LedgerStore::open(temp_dir.path()).unwrap().delivered();

        store.put(&block(1, b"a", 1)).await;
        store.put(&block(2, b"b", 2)).await;
        store.put(&block(3, b"c", 3)).await;

        assert_eq!(store.remove_where_height_lt(3).await, 2);
        assert!(store.where_height(1).await.is_empty());
        assert!(store.where_height(2).await.is_empty());
        assert_eq!(store.where_height(3).await.len(), 1);
    }
}
