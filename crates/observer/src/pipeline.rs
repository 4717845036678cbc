//! Submits observation batches to THORChain, keeping each one persisted until
//! the chain accepted it.

use std::{sync::Arc, time::Duration};

use bifrost_common::metrics::BifrostMetrics;
use bifrost_db::entities::TxInStatus;
use bifrost_primitives::tx::TxIn;
use bifrost_storage::TxInOps;
use bifrost_tasks::{ShutdownGuard, TaskExecutor};
use bifrost_thorclient::ThorchainRpc;
use tokio::sync::{mpsc, Mutex};
use tracing::*;

use crate::errors::ObserverResult;

type TxInReceiver = Arc<Mutex<mpsc::Receiver<TxIn>>>;

#[derive(Debug, Clone)]
pub struct PipelineParams {
    /// Number of submitting workers, also the capacity of the batch queue.
    pub workers: usize,

    /// How often failed batches are resubmitted.
    pub retry_interval: Duration,
}

pub struct ObservationPipeline<C> {
    rpc: Arc<C>,
    ops: Arc<TxInOps>,
    params: PipelineParams,
    metrics: Arc<BifrostMetrics>,
}

impl<C: ThorchainRpc> ObservationPipeline<C> {
    pub fn new(
        rpc: Arc<C>,
        ops: Arc<TxInOps>,
        params: PipelineParams,
        metrics: Arc<BifrostMetrics>,
    ) -> Self {
        Self {
            rpc,
            ops,
            params,
            metrics,
        }
    }

    /// Spawns the workers and the retry task. Returns the sending half of the
    /// batch queue.
    pub fn start(self, executor: &TaskExecutor) -> mpsc::Sender<TxIn> {
        let workers = self.params.workers.max(1);
        let (tx_in_tx, tx_in_rx) = mpsc::channel(workers);
        let tx_in_rx: TxInReceiver = Arc::new(Mutex::new(tx_in_rx));

        for _ in 0..workers {
            let rpc = self.rpc.clone();
            let ops = self.ops.clone();
            let tx_in_rx = tx_in_rx.clone();
            let metrics = self.metrics.clone();
            executor.spawn_critical_async_with_shutdown("observation_worker", move |shutdown| {
                worker_task(rpc, ops, tx_in_rx, metrics, shutdown)
            });
        }

        let ops = self.ops.clone();
        let retry_tx = tx_in_tx.clone();
        let interval = self.params.retry_interval;
        executor.spawn_critical_async_with_shutdown("observation_retry", move |shutdown| {
            retry_task(ops, retry_tx, interval, shutdown)
        });

        tx_in_tx
    }
}

async fn worker_task<C: ThorchainRpc>(
    rpc: Arc<C>,
    ops: Arc<TxInOps>,
    tx_in_rx: TxInReceiver,
    metrics: Arc<BifrostMetrics>,
    shutdown: ShutdownGuard,
) -> anyhow::Result<()> {
    loop {
        let tx_in = tokio::select! {
            _ = shutdown.wait_for_shutdown() => break,
            tx_in = next_batch(&tx_in_rx) => match tx_in {
                Some(tx_in) => tx_in,
                None => break,
            },
        };

        let height = tx_in.block_height;
        submit_batch(rpc.as_ref(), &ops, &metrics, tx_in)
            .instrument(debug_span!("observation", %height))
            .await?;
    }

    Ok(())
}

async fn next_batch(tx_in_rx: &TxInReceiver) -> Option<TxIn> {
    tx_in_rx.lock().await.recv().await
}

/// Posts one batch. A rejected batch is parked as failed, only storage
/// errors are returned.
async fn submit_batch<C: ThorchainRpc + ?Sized>(
    rpc: &C,
    ops: &TxInOps,
    metrics: &BifrostMetrics,
    tx_in: TxIn,
) -> ObserverResult<()> {
    let height = tx_in.block_height;
    ops.set_txin_status_async(tx_in.clone(), TxInStatus::Processing)
        .await?;

    let timer = metrics.send_to_thorchain_duration.start_timer();
    let res = rpc.post_observations(tx_in.to_observed_txs()).await;
    timer.observe_duration();

    match res {
        Ok(hash) => {
            ops.remove_txin_async(height).await?;
            metrics.tx_to_thorchain.inc();
            info!(%height, %hash, count = tx_in.count, "posted observations");
        }
        Err(err) => {
            warn!(%height, %err, "failed to post observations");
            metrics
                .observer_errors
                .with_label_values(&["post_observations"])
                .inc();
            ops.set_txin_status_async(tx_in, TxInStatus::Failed).await?;
        }
    }
    Ok(())
}

async fn retry_task(
    ops: Arc<TxInOps>,
    tx_in_tx: mpsc::Sender<TxIn>,
    interval: Duration,
    shutdown: ShutdownGuard,
) -> anyhow::Result<()> {
    // Whatever the previous run left behind, in flight or failed.
    let mut failed_only = false;
    loop {
        let batches = ops.get_txin_for_retry_async(failed_only).await?;
        if !batches.is_empty() {
            debug!(count = batches.len(), %failed_only, "resubmitting observations");
        }

        for tx_in in batches {
            // Queued batches leave the failed set so they are not queued twice.
            ops.set_txin_status_async(tx_in.clone(), TxInStatus::Processing)
                .await?;
            let sent = tokio::select! {
                _ = shutdown.wait_for_shutdown() => false,
                res = tx_in_tx.send(tx_in) => res.is_ok(),
            };
            if !sent {
                return Ok(());
            }
        }

        failed_only = true;
        tokio::select! {
            _ = shutdown.wait_for_shutdown() => return Ok(()),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
