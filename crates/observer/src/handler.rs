use std::sync::Arc;

use async_trait::async_trait;
use bifrost_binance::{
    rpc::types::{DexCoin, DexTx},
    Reader,
};
use bifrost_blockscanner::{BlockError, BlockHandler};
use bifrost_common::metrics::BifrostMetrics;
use bifrost_db::entities::TxInStatus;
use bifrost_primitives::{
    amount::Amount,
    asset::Asset,
    chain::Chain,
    coin::Coin,
    errors::ParseError,
    keys::Address,
    tx::{TxIn, TxInItem},
    txid::TxId,
};
use bifrost_storage::TxInOps;
use tokio::sync::mpsc;
use tracing::*;

use crate::{
    errors::{ObserverError, ObserverResult},
    pool::PoolAddressValidator,
};

/// Turns every Binance block into at most one observation batch holding the
/// transfers that paid a pool address.
///
/// A batch is stored as in flight before it is queued, so the height can be
/// marked done while the batch still waits for a submitting worker.
pub struct BinanceBlockHandler<R, V> {
    reader: Arc<R>,
    pools: Arc<V>,
    ops: Arc<TxInOps>,
    tx_in_tx: mpsc::Sender<TxIn>,
    metrics: Arc<BifrostMetrics>,
}

impl<R: Reader, V: PoolAddressValidator> BinanceBlockHandler<R, V> {
    pub fn new(
        reader: Arc<R>,
        pools: Arc<V>,
        ops: Arc<TxInOps>,
        tx_in_tx: mpsc::Sender<TxIn>,
        metrics: Arc<BifrostMetrics>,
    ) -> Self {
        Self {
            reader,
            pools,
            ops,
            tx_in_tx,
            metrics,
        }
    }

    /// Collects the pool-bound outputs of every tx at `height`, in block
    /// order.
    pub async fn extract(&self, height: i64) -> ObserverResult<TxIn> {
        let hashes = self.reader.get_tx_hashes(height).await?;
        trace!(%height, count = hashes.len(), "fetched tx hashes");

        let mut items = Vec::new();
        for hash in &hashes {
            let tx = self.reader.get_tx(hash).await?;
            items.extend(self.extract_tx(hash, &tx)?);
        }

        if hashes.is_empty() {
            self.metrics.block_without_tx.inc();
        } else if items.is_empty() {
            self.metrics.block_no_tx_in.inc();
        } else {
            self.metrics.block_with_tx_in.inc();
        }
        Ok(TxIn::new(height, Chain::bnb(), items))
    }

    fn extract_tx(&self, hash: &TxId, tx: &DexTx) -> ObserverResult<Vec<TxInItem>> {
        let invalid = |source: ParseError| ObserverError::InvalidTx {
            hash: hash.to_string(),
            source,
        };
        let chain = Chain::bnb();
        let mut items = Vec::new();

        for msg in tx.tx.value.msg.iter().filter(|m| m.is_send()) {
            for output in &msg.value.outputs {
                let to = match Address::new(&output.address) {
                    Ok(to) => to,
                    Err(err) => {
                        debug!(%hash, %err, "skipping output with unreadable address");
                        continue;
                    }
                };
                let Some(pool) = self.pools.is_valid_pool_address(&to, &chain) else {
                    continue;
                };
                if output.coins.is_empty() {
                    debug!(%hash, to = %pool.address, "skipping pool output without coins");
                    continue;
                }

                let Some(input) = msg.value.inputs.first() else {
                    warn!(%hash, "send message without inputs");
                    continue;
                };
                let sender = Address::new(&input.address).map_err(invalid)?;
                let coins = output
                    .coins
                    .iter()
                    .map(|c| to_coin(&chain, c))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(invalid)?;

                debug!(%hash, %sender, to = %pool.address, "observed pool transfer");
                items.push(TxInItem {
                    tx: hash.clone(),
                    sender,
                    to: pool.address,
                    coins,
                    memo: tx.tx.value.memo.clone(),
                    observed_pool_key: pool.pub_key,
                });
            }
        }

        Ok(items)
    }
}

impl<R, V> BinanceBlockHandler<R, V> {
    fn scan_error(&self, name: &str) {
        self.metrics
            .binance_block_scan_errors
            .with_label_values(&[name])
            .inc();
    }
}

fn to_coin(chain: &Chain, coin: &DexCoin) -> Result<Coin, ParseError> {
    let asset = Asset::on_chain(chain.clone(), &coin.denom)?;
    let amount = Amount::from_decimal_str(&coin.amount)?;
    Ok(Coin::new(asset, amount))
}

#[async_trait]
impl<R: Reader, V: PoolAddressValidator> BlockHandler for BinanceBlockHandler<R, V> {
    async fn handle_block(&self, height: i64) -> Result<(), BlockError> {
        // Nothing would match before the first pool set arrived.
        if !self.pools.is_ready() {
            self.scan_error("pools_not_loaded");
            return Err(BlockError::Retry(ObserverError::PoolsNotLoaded.into()));
        }

        let timer = self.metrics.search_tx_duration.start_timer();
        let res = self.extract(height).await;
        timer.observe_duration();
        let tx_in = res.map_err(|e| {
            self.scan_error("extract");
            BlockError::Retry(e.into())
        })?;

        if tx_in.tx_array.is_empty() {
            trace!(%height, "no pool transfers");
            return Ok(());
        }

        self.ops
            .set_txin_status_async(tx_in.clone(), TxInStatus::Processing)
            .await?;

        info!(%height, count = tx_in.count, "queueing observations");
        self.tx_in_tx
            .send(tx_in)
            .await
            .map_err(|_| BlockError::Retry(ObserverError::QueueClosed.into()))
    }
}
