//! Block-graph scratch store.

use crate::keys::{graph_hash_prefix, graph_key, graph_key_hash, graph_key_round, graph_round_prefix};
use crate::{run_blocking, CF_BLOCKGRAPHS};
use rocksdb::{IteratorMode, WriteBatch, DB};
use std::sync::Arc;
use tessera_types::{BlockGraph, Hash, NodeId};
use tracing::error;

/// Pending block-graph proposals, keyed by `round | hash | node`.
///
/// The key layout makes the `(hash, node, round)` identity unique by
/// construction and gives cheap per-round scans.
#[derive(Clone)]
pub struct BlockGraphStore {
    db: Arc<DB>,
}

impl BlockGraphStore {
    pub(crate) fn new(db: Arc<DB>) -> Self {
        Self { db }
    }

    /// Upsert a block-graph under its identity. Returns `false` on failure.
    pub async fn put(&self, bg: &BlockGraph) -> bool {
        let db = self.db.clone();
        let bg = bg.clone();
        run_blocking(move || put_blocking(&db, &bg)).await.unwrap_or(false)
    }

    /// Look up by exact identity.
    pub async fn get(&self, hash: Hash, node: NodeId, round: u64) -> Option<BlockGraph> {
        let db = self.db.clone();
        run_blocking(move || get_blocking(&db, hash, node, round))
            .await
            .flatten()
    }

    /// First block-graph for `(hash, round)` regardless of node.
    pub async fn get_by_hash_round(&self, hash: Hash, round: u64) -> Option<BlockGraph> {
        let db = self.db.clone();
        run_blocking(move || get_by_hash_round_blocking(&db, hash, round))
            .await
            .flatten()
    }

    /// All block-graphs proposed for a round.
    pub async fn where_round(&self, round: u64) -> Vec<BlockGraph> {
        let db = self.db.clone();
        run_blocking(move || where_round_blocking(&db, round))
            .await
            .unwrap_or_default()
    }

    /// Remove by exact identity. Returns `false` on failure.
    pub async fn remove(&self, hash: Hash, node: NodeId, round: u64) -> bool {
        let db = self.db.clone();
        run_blocking(move || remove_blocking(&db, hash, node, round))
            .await
            .unwrap_or(false)
    }

    /// Remove every block-graph whose round is below `round`.
    /// Returns the number removed.
    pub async fn remove_where_round_lt(&self, round: u64) -> usize {
        let db = self.db.clone();
        run_blocking(move || remove_where_round_lt_blocking(&db, round))
            .await
            .unwrap_or(0)
    }

    /// Remove every block-graph whose block-side hash matches, at any round.
    /// Returns the number removed.
    pub async fn remove_by_hash(&self, hash: Hash) -> usize {
        let db = self.db.clone();
        run_blocking(move || remove_by_hash_blocking(&db, hash))
            .await
            .unwrap_or(0)
    }
}

fn put_blocking(db: &DB, bg: &BlockGraph) -> bool {
    let cf = match db.cf_handle(CF_BLOCKGRAPHS) {
        Some(cf) => cf,
        None => {
            error!("blockgraphs column family not found");
            return false;
        }
    };
    let key = graph_key(bg.block.round, &bg.block.hash, bg.block.node);
    let value = match bincode::serialize(bg) {
        Ok(v) => v,
        Err(e) => {
            error!(identity = %bg.identity(), "failed to encode block-graph: {e}");
            return false;
        }
    };
    if let Err(e) = db.put_cf(cf, key, value) {
        error!(identity = %bg.identity(), "failed to store block-graph: {e}");
        return false;
    }
    true
}

fn get_blocking(db: &DB, hash: Hash, node: NodeId, round: u64) -> Option<BlockGraph> {
    let cf = db.cf_handle(CF_BLOCKGRAPHS)?;
    match db.get_cf(cf, graph_key(round, &hash, node)) {
        Ok(Some(value)) => decode(&value),
        Ok(None) => None,
        Err(e) => {
            error!(%hash, %node, round, "failed to read block-graph: {e}");
            None
        }
    }
}

fn get_by_hash_round_blocking(db: &DB, hash: Hash, round: u64) -> Option<BlockGraph> {
    let cf = db.cf_handle(CF_BLOCKGRAPHS)?;
    let prefix = graph_hash_prefix(round, &hash);
    let iter = db.iterator_cf(cf, IteratorMode::From(&prefix, rocksdb::Direction::Forward));

    iter.take_while(|item| match item {
        Ok((key, _)) => key.starts_with(&prefix),
        Err(_) => false,
    })
    .find_map(|item| item.ok().and_then(|(_, value)| decode(&value)))
}

fn where_round_blocking(db: &DB, round: u64) -> Vec<BlockGraph> {
    let cf = match db.cf_handle(CF_BLOCKGRAPHS) {
        Some(cf) => cf,
        None => return Vec::new(),
    };
    let prefix = graph_round_prefix(round);
    let iter = db.iterator_cf(cf, IteratorMode::From(&prefix, rocksdb::Direction::Forward));

    iter.take_while(|item| match item {
        Ok((key, _)) => key.starts_with(&prefix),
        Err(_) => false,
    })
    .filter_map(|item| item.ok().and_then(|(_, value)| decode(&value)))
    .collect()
}

fn remove_blocking(db: &DB, hash: Hash, node: NodeId, round: u64) -> bool {
    let cf = match db.cf_handle(CF_BLOCKGRAPHS) {
        Some(cf) => cf,
        None => return false,
    };
    match db.delete_cf(cf, graph_key(round, &hash, node)) {
        Ok(()) => true,
        Err(e) => {
            error!(%hash, %node, round, "failed to remove block-graph: {e}");
            false
        }
    }
}

fn remove_where_round_lt_blocking(db: &DB, round: u64) -> usize {
    let cf = match db.cf_handle(CF_BLOCKGRAPHS) {
        Some(cf) => cf,
        None => return 0,
    };

    let mut batch = WriteBatch::default();
    let mut removed = 0usize;
    for item in db.iterator_cf(cf, IteratorMode::Start) {
        let Ok((key, _)) = item else { break };
        match graph_key_round(&key) {
            Some(r) if r < round => {
                batch.delete_cf(cf, key);
                removed += 1;
            }
            // Keys are round-ordered; the first key at or past the bound
            // ends the scan.
            _ => break,
        }
    }

    if let Err(e) = db.write(batch) {
        error!(round, "failed to prune block-graphs: {e}");
        return 0;
    }
    removed
}

fn remove_by_hash_blocking(db: &DB, hash: Hash) -> usize {
    let cf = match db.cf_handle(CF_BLOCKGRAPHS) {
        Some(cf) => cf,
        None => return 0,
    };

    let mut batch = WriteBatch::default();
    let mut removed = 0usize;
    for item in db.iterator_cf(cf, IteratorMode::Start) {
        let Ok((key, _)) = item else { break };
        if graph_key_hash(&key) == Some(hash) {
            batch.delete_cf(cf, key);
            removed += 1;
        }
    }

    if let Err(e) = db.write(batch) {
        error!(%hash, "failed to remove block-graphs by hash: {e}");
        return 0;
    }
    removed
}

fn decode(value: &[u8]) -> Option<BlockGraph> {
    match bincode::deserialize(value) {
        Ok(bg) => Some(bg),
        Err(e) => {
            error!("failed to decode block-graph: {e}");
            None
        }
    }
}
