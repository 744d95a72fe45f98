//! Node lifecycle tests: construction, genesis seeding, consensus over the
//! full wiring, restart recovery and shutdown.

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tessera_consensus::testing::{ChainValidator, RecordingBroadcaster, StaticPeerProvider};
use tessera_consensus::CoreConfig;
use tessera_node::{KeystoreSigner, Node, NodeBuilder};
use tessera_storage::LedgerStore;
use tessera_types::{Block, BlockGraph, BlockPos, GraphSide, NodeId, Transaction, TxnId};

const LOCAL: NodeId = NodeId(42);

fn test_config() -> CoreConfig {
    CoreConfig {
        debounce: Duration::from_millis(50),
        batch_window: Duration::from_millis(25),
        ..CoreConfig::default()
    }
}

async fn build_node(store: &LedgerStore, peers: usize) -> Node {
    tessera_node::telemetry::init_logging();
    NodeBuilder::new(LOCAL)
        .store(store.clone())
        .peer_provider(Arc::new(StaticPeerProvider::with_count(peers)))
        .broadcaster(Arc::new(RecordingBroadcaster::new()))
        .validator(Arc::new(ChainValidator::new(store.chain())))
        .signer(Arc::new(KeystoreSigner::from_seed([42; 32])))
        .config(test_config())
        .build()
        .await
        .expect("node builds")
}

fn make_block(prev: &Block, tag: u8, solution: u64) -> Block {
    Block::new(
        prev.height + 1,
        prev.hash,
        vec![Transaction::new(TxnId([tag; 32]), vec![tag])],
        BlockPos {
            public_key: vec![tag; 32],
            solution,
        },
    )
}

fn proposal(block: &Block, prev: &Block, node: u64) -> BlockGraph {
    let data = bincode::serialize(block).unwrap();
    let mut bg = BlockGraph::new(
        GraphSide::new(block.hash, NodeId(node), block.height, data),
        GraphSide::new(prev.hash, NodeId(node), prev.height, vec![]),
    );
    if NodeId(node) != LOCAL {
        bg.signature = vec![node as u8; 64];
        bg.public_key = vec![node as u8; 32];
    }
    bg
}

macro_rules! wait_until {
    ($cond:expr) => {{
        let mut ok = false;
        for _ in 0..200 {
            if $cond {
                ok = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        ok
    }};
}

#[tokio::test]
async fn fresh_node_seeds_genesis() {
    let temp = TempDir::new().unwrap();
    let store = LedgerStore::open(temp.path()).unwrap();
    let node = build_node(&store, 0).await;

    assert_eq!(node.core().get_height().await, 0);
    let genesis = node.core().get_block(0).await.unwrap();
    assert_eq!(genesis, Block::genesis());

    node.shutdown().await;
}

#[tokio::test]
async fn builder_requires_collaborators() {
    let temp = TempDir::new().unwrap();
    let result = NodeBuilder::new(LOCAL)
        .storage_path(temp.path())
        .build()
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn full_wiring_commits_a_round() {
    let temp = TempDir::new().unwrap();
    let store = LedgerStore::open(temp.path()).unwrap();
    let node = build_node(&store, 3).await;

    let genesis = node.core().get_block(0).await.unwrap();
    let block = make_block(&genesis, 1, 3);
    for peer in [LOCAL.0, 1, 2, 3] {
        assert!(node.core().submit_block_graph(proposal(&block, &genesis, peer)).await);
    }

    assert!(wait_until!(node.core().get_height().await == 1));
    assert_eq!(node.core().get_block(1).await.unwrap(), block);
    assert_eq!(
        node.core().get_transaction(&[1; 32]).await.unwrap().txn_id,
        TxnId([1; 32])
    );

    node.shutdown().await;
}

#[tokio::test]
async fn restart_preserves_chain_and_replays() {
    let temp = TempDir::new().unwrap();

    // First life commits a block.
    {
        let store = LedgerStore::open(temp.path()).unwrap();
        let node = build_node(&store, 3).await;
        let genesis = node.core().get_block(0).await.unwrap();
        let block = make_block(&genesis, 1, 3);
        for peer in [LOCAL.0, 1, 2, 3] {
            node.core().submit_block_graph(proposal(&block, &genesis, peer)).await;
        }
        assert!(wait_until!(node.core().get_height().await == 1));
        node.shutdown().await;
    }

    // Second life opens the same directory and picks up where it left off.
    let store = LedgerStore::open(temp.path()).unwrap();
    let node = build_node(&store, 3).await;
    assert_eq!(node.core().get_height().await, 1);

    let one = node.core().get_block(1).await.unwrap();
    let block = make_block(&one, 2, 4);
    for peer in [LOCAL.0, 1, 2, 3] {
        node.core().submit_block_graph(proposal(&block, &one, peer)).await;
    }
    assert!(wait_until!(node.core().get_height().await == 2));

    node.shutdown().await;
}

#[tokio::test]
async fn shutdown_handle_stops_ingress() {
    let temp = TempDir::new().unwrap();
    let store = LedgerStore::open(temp.path()).unwrap();
    let node = build_node(&store, 0).await;

    let handle = node.shutdown_handle();
    handle.shutdown();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The submission queue is closed once the ingress task exits.
    let genesis = node.core().get_block(0).await.unwrap();
    let block = make_block(&genesis, 1, 3);
    assert!(!node.core().submit_block_graph(proposal(&block, &genesis, LOCAL.0)).await);

    node.shutdown().await;
}
