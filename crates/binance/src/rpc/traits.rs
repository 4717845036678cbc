use async_trait::async_trait;
use bifrost_primitives::{keys::Address, txid::TxId};

use super::{
    error::ClientResult,
    types::{Account, DexTx},
};

/// Read side used by the observer.
#[async_trait]
pub trait Reader: Sync + Send + 'static {
    /// Hashes of every tx included at `height`, in block order.
    async fn get_tx_hashes(&self, height: i64) -> ClientResult<Vec<TxId>>;

    /// Full tx detail from the DEX.
    async fn get_tx(&self, hash: &TxId) -> ClientResult<DexTx>;
}

/// Write side used by the signer.
#[async_trait]
pub trait Broadcaster: Sync + Send + 'static {
    /// Account number and next sequence of `addr`.
    async fn get_account(&self, addr: &Address) -> ClientResult<Account>;

    /// Submits a hex-encoded signed tx and returns the hash the node assigned.
    async fn broadcast(&self, tx_hex: &str) -> ClientResult<TxId>;
}
