//! Round derivation.

use tessera_storage::ChainStore;

/// Derives the current consensus round from the chain.
///
/// The round equals the height of the latest finalized block, so the next
/// round is the height the network is currently proposing for. Stateless:
/// the chain is re-queried on every call.
#[derive(Clone)]
pub struct RoundOracle {
    chain: ChainStore,
}

impl RoundOracle {
    pub fn new(chain: ChainStore) -> Self {
        Self { chain }
    }

    /// Current round: `chain block count - 1`, saturating at 0.
    pub async fn round(&self) -> u64 {
        self.chain.count().await.saturating_sub(1)
    }

    /// The round being proposed for: `round() + 1`.
    pub async fn next_round(&self) -> u64 {
        self.round().await + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tessera_storage::LedgerStore;
    use tessera_types::Block;

    #[tokio::test]
    async fn saturates_on_empty_chain() {
        let temp_dir = TempDir::new().unwrap();
        let chain = LedgerStore::open(temp_dir.path()).unwrap().chain();
        let oracle = RoundOracle::new(chain);

        assert_eq!(oracle.round().await, 0);
        assert_eq!(oracle.next_round().await, 1);
    }

    #[tokio::test]
    async fn follows_chain_growth() {
        let temp_dir = TempDir::new().unwrap();
        let chain = LedgerStore::open(temp_dir.path()).unwrap().chain();
        let oracle = RoundOracle::new(chain.clone());

        chain.put(&Block::genesis()).await;
        assert_eq!(oracle.round().await, 0);
        assert_eq!(oracle.next_round().await, 1);

        let next = Block::new(1, Block::genesis().hash, vec![], Default::default());
        chain.put(&next).await;
        assert_eq!(oracle.round().await, 1);
        assert_eq!(oracle.next_round().await, 2);
    }
}
