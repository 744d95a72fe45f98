//! Node construction and lifecycle.

use std::path::PathBuf;
use std::sync::Arc;
use tessera_consensus::{
    BlockGraphIngress, Broadcaster, ConsensusCore, Coordinator, CoreConfig, Finalizer,
    PeerProvider, RoundOracle, SeenHashFilter, Signer, Validator,
};
use tessera_storage::{LedgerStore, StorageError};
use tessera_types::{Block, NodeId};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Errors from node construction.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("Failed to seed genesis block")]
    Genesis,
}

/// Handle for shutting down a running [`Node`].
///
/// When dropped, signals the node to exit gracefully.
#[derive(Debug)]
pub struct ShutdownHandle {
    token: Option<CancellationToken>,
}

impl ShutdownHandle {
    /// Trigger shutdown (consumes the handle).
    pub fn shutdown(mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

impl Drop for ShutdownHandle {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

/// Builder for a [`Node`].
///
/// Required: a storage location (or opened store), the local node id, and
/// the four collaborators. The configuration defaults to the protocol
/// constants.
pub struct NodeBuilder {
    path: Option<PathBuf>,
    store: Option<LedgerStore>,
    node_id: NodeId,
    peer_provider: Option<Arc<dyn PeerProvider>>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
    validator: Option<Arc<dyn Validator>>,
    signer: Option<Arc<dyn Signer>>,
    config: CoreConfig,
}

impl NodeBuilder {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            path: None,
            store: None,
            node_id,
            peer_provider: None,
            broadcaster: None,
            validator: None,
            signer: None,
            config: CoreConfig::default(),
        }
    }

    /// Open (or create) storage at this path.
    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Use an already-opened store.
    pub fn store(mut self, store: LedgerStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn peer_provider(mut self, provider: Arc<dyn PeerProvider>) -> Self {
        self.peer_provider = Some(provider);
        self
    }

    pub fn broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn config(mut self, config: CoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Open storage, seed genesis on first start, replay persisted state and
    /// spawn the consensus tasks.
    pub async fn build(self) -> Result<Node, NodeError> {
        let store = match (self.store, self.path) {
            (Some(store), _) => store,
            (None, Some(path)) => LedgerStore::open(path)?,
            (None, None) => return Err(NodeError::MissingCollaborator("storage")),
        };
        let peer_provider = self
            .peer_provider
            .ok_or(NodeError::MissingCollaborator("peer provider"))?;
        let broadcaster = self
            .broadcaster
            .ok_or(NodeError::MissingCollaborator("broadcaster"))?;
        let validator = self
            .validator
            .ok_or(NodeError::MissingCollaborator("validator"))?;
        let signer = self.signer.ok_or(NodeError::MissingCollaborator("signer"))?;
        let config = self.config;

        if store.chain().count().await == 0 {
            info!("empty chain, seeding genesis block");
            if !store.chain().put(&Block::genesis()).await {
                return Err(NodeError::Genesis);
            }
        }

        let shutdown = CancellationToken::new();
        let seen = Arc::new(SeenHashFilter::new(config.seen_capacity));
        let rounds = RoundOracle::new(store.chain());

        let mut tasks = Vec::new();
        tasks.push(
            seen.clone()
                .spawn_flush_task(config.seen_flush_interval, shutdown.clone()),
        );

        let finalizer = Arc::new(Finalizer::new(
            store.chain(),
            store.block_graphs(),
            store.delivered(),
            seen.clone(),
            rounds.clone(),
            validator.clone(),
        ));

        let (completion_tx, completion_rx) = mpsc::channel(config.completion_queue_depth);
        let coordinator = Coordinator::new(
            self.node_id,
            store.block_graphs(),
            rounds.clone(),
            finalizer,
            completion_rx,
            config.clone(),
        );
        tasks.push(coordinator.spawn(shutdown.clone()));

        let ingress = BlockGraphIngress::new(
            self.node_id,
            store.block_graphs(),
            store.delivered(),
            seen.clone(),
            rounds,
            peer_provider,
            broadcaster,
            validator,
            signer,
            completion_tx,
            config.signer_key_name.clone(),
        );
        ingress.replay_current_round().await;
        let (ingress_handle, ingress_task) =
            ingress.spawn(config.ingress_queue_depth, shutdown.clone());
        tasks.push(ingress_task);

        let core = ConsensusCore::new(store, seen, ingress_handle);
        info!(node = %self.node_id, height = core.get_height().await, "node started");

        Ok(Node {
            core,
            shutdown,
            tasks,
        })
    }
}

/// A running node: the consensus core plus its background tasks.
pub struct Node {
    core: ConsensusCore,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Node {
    /// Handle to the consensus core operations.
    pub fn core(&self) -> &ConsensusCore {
        &self.core
    }

    /// A detached shutdown handle; dropping it stops the node.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            token: Some(self.shutdown.clone()),
        }
    }

    /// Stop all tasks and wait for them to drain.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("task failed during shutdown: {e}");
            }
        }
        info!("node stopped");
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}
