use std::sync::Arc;

use async_trait::async_trait;
use bifrost_blockscanner::{BlockError, BlockHandler};
use bifrost_common::metrics::BifrostMetrics;
use bifrost_db::entities::TxOutStatusItem;
use bifrost_primitives::keys::PubKey;
use bifrost_storage::TxOutOps;
use bifrost_thorclient::ThorchainRpc;
use tokio::sync::mpsc;
use tracing::*;

use crate::errors::SignerError;

/// Picks up the outbound array of every THORChain block and hands non-empty
/// ones to the signer.
pub struct OutboundHandler<C> {
    rpc: Arc<C>,
    ops: Arc<TxOutOps>,
    pool_key: Option<PubKey>,
    height_tx: mpsc::Sender<i64>,
    metrics: Arc<BifrostMetrics>,
}

impl<C: ThorchainRpc> OutboundHandler<C> {
    /// Without a `pool_key` the whole array is fetched and the signer keeps
    /// the items addressed to its own pool address.
    pub fn new(
        rpc: Arc<C>,
        ops: Arc<TxOutOps>,
        pool_key: Option<PubKey>,
        height_tx: mpsc::Sender<i64>,
        metrics: Arc<BifrostMetrics>,
    ) -> Self {
        Self {
            rpc,
            ops,
            pool_key,
            height_tx,
            metrics,
        }
    }
}

#[async_trait]
impl<C: ThorchainRpc> BlockHandler for OutboundHandler<C> {
    async fn handle_block(&self, height: i64) -> Result<(), BlockError> {
        let mut tx_out = self
            .rpc
            .get_tx_out(height, self.pool_key)
            .await
            .map_err(|e| {
                self.metrics
                    .thorchain_block_scan_errors
                    .with_label_values(&["get_tx_out"])
                    .inc();
                BlockError::Retry(e.into())
            })?;

        if tx_out.is_empty() {
            trace!(%height, "no outbound");
            self.metrics.block_no_tx_out.inc();
            return Ok(());
        }
        tx_out.height = height;

        // A rescanned height must not reset a batch that is already being
        // signed.
        if self.ops.get_txout_async(height).await?.is_some() {
            debug!(%height, "outbound already tracked");
        } else {
            info!(%height, count = tx_out.tx_array.len(), "new outbound");
            self.ops
                .put_txout_async(TxOutStatusItem::pending(tx_out))
                .await?;
        }

        self.height_tx
            .send(height)
            .await
            .map_err(|_| BlockError::Retry(SignerError::QueueClosed.into()))
    }
}

#[cfg(test)]
mod tests {
    use bifrost_db::entities::TxOutStatus;
    use bifrost_primitives::{tx::TxOut, txid::TxId};
    use bifrost_thorclient::MockThorchainRpc;

    use super::*;
    use crate::test_utils::{get_ops, metrics, outbound, signer_key};

    #[tokio::test]
    async fn test_empty_outbound_is_done() {
        let ops = get_ops();
        let mut rpc = MockThorchainRpc::new();
        rpc.expect_get_tx_out().returning(|height, _| {
            Ok(TxOut {
                height,
                hash: String::new(),
                chain: None,
                tx_array: vec![],
            })
        });
        let (tx, mut rx) = mpsc::channel(1);
        let handler = OutboundHandler::new(Arc::new(rpc), ops.clone(), Some(signer_key()), tx, metrics());

        let res = handler.handle_block(7).await;
        assert!(res.is_ok(), "should accept an empty outbound but got: {res:?}");
        assert!(rx.try_recv().is_err());
        assert_eq!(ops.get_txout_blocking(7).unwrap(), None);
        assert_eq!(handler.metrics.block_no_tx_out.get(), 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_retries_the_height() {
        let ops = get_ops();
        let mut rpc = MockThorchainRpc::new();
        rpc.expect_get_tx_out()
            .returning(|_, _| Err(bifrost_thorclient::ClientError::Empty));
        let (tx, mut rx) = mpsc::channel(1);
        let handler = OutboundHandler::new(Arc::new(rpc), ops.clone(), None, tx, metrics());

        let res = handler.handle_block(6).await;
        assert!(matches!(res, Err(BlockError::Retry(_))), "got {res:?}");
        assert!(rx.try_recv().is_err());
        assert_eq!(
            handler
                .metrics
                .thorchain_block_scan_errors
                .with_label_values(&["get_tx_out"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_outbound_is_persisted_and_queued() {
        let ops = get_ops();
        let key = signer_key();
        let mut rpc = MockThorchainRpc::new();
        rpc.expect_get_tx_out()
            .withf(move |height, pub_key| *height == 8 && *pub_key == Some(key))
            .returning(|height, _| Ok(outbound(height)));
        let (tx, mut rx) = mpsc::channel(1);
        let handler = OutboundHandler::new(Arc::new(rpc), ops.clone(), Some(signer_key()), tx, metrics());

        assert!(handler.handle_block(8).await.is_ok());
        assert_eq!(rx.try_recv().unwrap(), 8);

        let stored = ops.get_txout_blocking(8).unwrap().unwrap();
        assert_eq!(stored, TxOutStatusItem::pending(outbound(8)));
    }

    #[tokio::test]
    async fn test_rescan_keeps_existing_state() {
        let ops = get_ops();
        let broadcast = TxOutStatusItem {
            tx_out: outbound(9),
            status: TxOutStatus::Broadcast {
                hash: TxId::from_digest([4; 32]),
            },
        };
        ops.put_txout_blocking(broadcast.clone()).unwrap();

        let mut rpc = MockThorchainRpc::new();
        rpc.expect_get_tx_out()
            .returning(|height, _| Ok(outbound(height)));
        let (tx, mut rx) = mpsc::channel(1);
        let handler = OutboundHandler::new(Arc::new(rpc), ops.clone(), None, tx, metrics());

        assert!(handler.handle_block(9).await.is_ok());
        assert_eq!(rx.try_recv().unwrap(), 9);
        assert_eq!(ops.get_txout_blocking(9).unwrap(), Some(broadcast));
    }
}
