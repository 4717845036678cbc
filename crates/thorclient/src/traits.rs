use async_trait::async_trait;
use bifrost_primitives::{
    chain::Chain,
    keys::PubKey,
    pool::PoolAddresses,
    tx::{ObservedTx, TxOut},
    txid::TxId,
};

use crate::errors::ClientResult;

/// Everything the bifrost asks of, or submits to, THORChain.
#[cfg_attr(feature = "mocks", mockall::automock)]
#[async_trait]
pub trait ThorchainRpc: Sync + Send + 'static {
    async fn get_pool_addresses(&self) -> ClientResult<PoolAddresses>;

    /// Highest height of `chain` the network has recorded an observation for.
    async fn get_last_observed_height(&self, chain: Chain) -> ClientResult<i64>;

    /// Outbound array of chain block `height`, restricted to `pub_key` when
    /// one is given.
    async fn get_tx_out(&self, height: i64, pub_key: Option<PubKey>) -> ClientResult<TxOut>;

    /// Signs and submits one `ObservedTxIn` vote carrying `txs`.
    async fn post_observations(&self, txs: Vec<ObservedTx>) -> ClientResult<TxId>;

    /// Signs and submits the hash of the outbound transfer made for `height`.
    async fn post_outbound(&self, height: i64, tx_id: TxId, memo: String) -> ClientResult<TxId>;

    /// Fails unless the node account may submit observations.
    async fn check_whitelisted(&self) -> ClientResult<()>;
}
