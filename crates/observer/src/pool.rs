//! The pool keys THORChain currently custodies funds with, and the addresses
//! they own on each chain.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use bifrost_common::metrics::BifrostMetrics;
use bifrost_primitives::{
    chain::Chain,
    keys::{Address, Network, PubKey, THOR_HRP},
    pool::PoolAddresses,
};
use bifrost_tasks::{ShutdownGuard, TaskExecutor};
use bifrost_thorclient::{ClientResult, ThorchainRpc};
use parking_lot::RwLock;
use tracing::*;

/// The pool key owning an address, and that address as derived from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolAddressMatch {
    pub pub_key: PubKey,
    pub address: Address,
}

pub trait PoolAddressValidator: Send + Sync + 'static {
    /// Returns the owning pool key when `addr` belongs to the previous,
    /// current or next pool on `chain`.
    fn is_valid_pool_address(&self, addr: &Address, chain: &Chain) -> Option<PoolAddressMatch>;

    /// False until a pool set was loaded at least once.
    fn is_ready(&self) -> bool;
}

/// Keeps the latest pool set in memory, refreshed from the chain.
///
/// Starts with an empty set, which matches nothing and is not ready.
#[derive(Debug)]
pub struct PoolAddressManager {
    pools: RwLock<PoolAddresses>,
    loaded: AtomicBool,
    network: Network,
}

impl PoolAddressManager {
    pub fn new(network: Network) -> Self {
        Self {
            pools: RwLock::new(PoolAddresses::default()),
            loaded: AtomicBool::new(false),
            network,
        }
    }

    pub fn with_pools(network: Network, pools: PoolAddresses) -> Self {
        let manager = Self::new(network);
        manager.update(pools);
        manager
    }

    pub fn current(&self) -> PoolAddresses {
        self.pools.read().clone()
    }

    pub fn update(&self, pools: PoolAddresses) {
        *self.pools.write() = pools;
        self.loaded.store(true, Ordering::Release);
    }

    /// Fetches the pool set once. The previous set stays in place on error.
    pub async fn refresh<R: ThorchainRpc + ?Sized>(&self, rpc: &R) -> ClientResult<()> {
        let pools = rpc.get_pool_addresses().await?;
        if pools != *self.pools.read() {
            info!(
                previous = ?pools.previous.map(|k| k.to_string()),
                current = ?pools.current.map(|k| k.to_string()),
                next = ?pools.next.map(|k| k.to_string()),
                rotate_at = %pools.rotate_at,
                "pool addresses changed"
            );
        }
        self.update(pools);
        Ok(())
    }

    /// Spawns the task refreshing the set every `interval`.
    pub fn start<R: ThorchainRpc>(
        self: &Arc<Self>,
        rpc: Arc<R>,
        interval: Duration,
        metrics: Arc<BifrostMetrics>,
        executor: &TaskExecutor,
    ) {
        let manager = self.clone();
        executor.spawn_critical_async_with_shutdown("pool_refresh", move |shutdown| {
            refresh_task(manager, rpc, interval, metrics, shutdown)
        });
    }

    fn hrp(&self, chain: &Chain) -> Option<&'static str> {
        if chain.is_bnb() {
            Some(self.network.hrp())
        } else if *chain == Chain::thor() {
            Some(THOR_HRP)
        } else {
            None
        }
    }
}

impl PoolAddressValidator for PoolAddressManager {
    fn is_valid_pool_address(&self, addr: &Address, chain: &Chain) -> Option<PoolAddressMatch> {
        let hrp = self.hrp(chain)?;
        let pools = self.pools.read();

        [pools.previous, pools.current, pools.next]
            .into_iter()
            .flatten()
            .find_map(|pub_key| match pub_key.address(hrp) {
                Ok(address) if address == *addr => Some(PoolAddressMatch { pub_key, address }),
                Ok(_) => None,
                Err(err) => {
                    error!(%pub_key, %err, "cannot derive pool address");
                    None
                }
            })
    }

    fn is_ready(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }
}

async fn refresh_task<R: ThorchainRpc>(
    manager: Arc<PoolAddressManager>,
    rpc: Arc<R>,
    interval: Duration,
    metrics: Arc<BifrostMetrics>,
    shutdown: ShutdownGuard,
) -> anyhow::Result<()> {
    loop {
        if let Err(err) = manager.refresh(rpc.as_ref()).await {
            warn!(%err, "failed to refresh pool addresses, keeping the previous set");
            metrics
                .pool_address_manager_errors
                .with_label_values(&["refresh"])
                .inc();
        }

        tokio::select! {
            _ = shutdown.wait_for_shutdown() => return Ok(()),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use bifrost_thorclient::{ClientError, MockThorchainRpc};
    use secp256k1::{SecretKey, SECP256K1};

    use super::*;

    fn key(byte: u8) -> PubKey {
        let sk = SecretKey::from_slice(&[byte; 32]).unwrap();
        PubKey::new(sk.public_key(SECP256K1))
    }

    #[test]
    fn test_matches_every_pool_slot() {
        let pools = PoolAddresses {
            previous: Some(key(1)),
            current: Some(key(2)),
            next: Some(key(3)),
            rotate_at: 0,
        };
        let manager = PoolAddressManager::with_pools(Network::Testnet, pools);

        for byte in [1, 2, 3] {
            let addr = key(byte).address("tbnb").unwrap();
            let matched = manager
                .is_valid_pool_address(&addr, &Chain::bnb())
                .expect("pool address should match");
            assert_eq!(matched.pub_key, key(byte));
            assert_eq!(matched.address, addr);
        }

        let stranger = key(4).address("tbnb").unwrap();
        assert!(manager
            .is_valid_pool_address(&stranger, &Chain::bnb())
            .is_none());
    }

    #[test]
    fn test_match_is_case_insensitive_and_per_chain() {
        let manager = PoolAddressManager::with_pools(
            Network::Testnet,
            PoolAddresses {
                current: Some(key(2)),
                ..Default::default()
            },
        );
        let upper = key(2).address("tbnb").unwrap().as_str().to_uppercase();
        let addr = Address::new(&upper).unwrap();
        assert!(manager.is_valid_pool_address(&addr, &Chain::bnb()).is_some());

        // Same key, other chain's prefix.
        let thor_addr = key(2).address(THOR_HRP).unwrap();
        assert!(manager
            .is_valid_pool_address(&thor_addr, &Chain::bnb())
            .is_none());
        assert!(manager
            .is_valid_pool_address(&thor_addr, &Chain::thor())
            .is_some());
    }

    #[test]
    fn test_empty_set_matches_nothing() {
        let manager = PoolAddressManager::new(Network::Mainnet);
        let addr = key(1).address("bnb").unwrap();
        assert!(manager.is_valid_pool_address(&addr, &Chain::bnb()).is_none());
        assert!(!manager.is_ready());

        // An empty set from the chain is still a loaded set.
        manager.update(PoolAddresses::default());
        assert!(manager.is_ready());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_set() {
        let first = PoolAddresses {
            current: Some(key(5)),
            ..Default::default()
        };
        let expected = first.clone();

        let mut rpc = MockThorchainRpc::new();
        let mut calls = 0;
        rpc.expect_get_pool_addresses().times(2).returning(move || {
            calls += 1;
            if calls == 1 {
                Ok(first.clone())
            } else {
                Err(ClientError::Empty)
            }
        });

        let manager = PoolAddressManager::new(Network::Testnet);
        assert!(manager.refresh(&rpc).await.is_ok());
        assert!(manager.is_ready());
        assert!(manager.refresh(&rpc).await.is_err());
        assert_eq!(manager.current(), expected);
        assert!(manager.is_ready());
    }

    #[tokio::test]
    async fn test_failed_first_refresh_is_not_ready() {
        let mut rpc = MockThorchainRpc::new();
        rpc.expect_get_pool_addresses()
            .returning(|| Err(ClientError::Empty));

        let manager = PoolAddressManager::new(Network::Testnet);
        assert!(manager.refresh(&rpc).await.is_err());
        assert!(!manager.is_ready());
    }
}
