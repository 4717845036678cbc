use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bifrost_common::metrics::BifrostMetrics;
use bifrost_db::entities::BlockScanStatus;
use bifrost_storage::ScannerOps;
use bifrost_tasks::{ShutdownGuard, TaskExecutor};
use tokio::sync::{mpsc, Mutex};
use tracing::*;

use crate::{
    errors::{BlockError, ScannerError, ScannerResult},
    fetcher::HeightFetcher,
};

/// Per-height work run by the scanner workers.
#[async_trait]
pub trait BlockHandler: Send + Sync + 'static {
    async fn handle_block(&self, height: i64) -> Result<(), BlockError>;
}

#[derive(Debug, Clone)]
pub struct ScannerParams {
    /// Treated as the last scanned height when nothing is persisted.
    pub start_pos: i64,

    /// Number of workers, also the capacity of the height queue.
    pub processors: usize,

    /// Pause between tip polls when there is nothing new.
    pub discover_backoff: Duration,

    /// How often failed heights are re-published.
    pub retry_interval: Duration,
}

type HeightReceiver = Arc<Mutex<mpsc::Receiver<i64>>>;

/// Follows a chain tip and runs a [`BlockHandler`] for every height exactly
/// once per success, persisting progress so restarts resume where they left.
pub struct BlockScanner<F, H> {
    fetcher: Arc<F>,
    handler: Arc<H>,
    ops: Arc<ScannerOps>,
    params: ScannerParams,
    metrics: Arc<BifrostMetrics>,
}

impl<F: HeightFetcher, H: BlockHandler> BlockScanner<F, H> {
    pub fn new(
        fetcher: Arc<F>,
        handler: Arc<H>,
        ops: Arc<ScannerOps>,
        params: ScannerParams,
        metrics: Arc<BifrostMetrics>,
    ) -> Self {
        Self {
            fetcher,
            handler,
            ops,
            params,
            metrics,
        }
    }

    /// Spawns the discovery task, the retry task and the workers.
    pub fn start(self, executor: &TaskExecutor) {
        let processors = self.params.processors.max(1);
        let (height_tx, height_rx) = mpsc::channel(processors);
        let height_rx: HeightReceiver = Arc::new(Mutex::new(height_rx));

        for _ in 0..processors {
            let handler = self.handler.clone();
            let ops = self.ops.clone();
            let height_rx = height_rx.clone();
            let metrics = self.metrics.clone();
            executor.spawn_critical_async_with_shutdown("block_worker", move |shutdown| {
                block_worker_task(handler, ops, height_rx, metrics, shutdown)
            });
        }

        let ops = self.ops.clone();
        let retry_tx = height_tx.clone();
        let retry_interval = self.params.retry_interval;
        let metrics = self.metrics.clone();
        executor.spawn_critical_async_with_shutdown("block_retry", move |shutdown| {
            retry_failed_blocks_task(ops, retry_tx, retry_interval, metrics, shutdown)
        });

        let fetcher = self.fetcher.clone();
        let ops = self.ops.clone();
        let params = self.params.clone();
        let metrics = self.metrics;
        executor.spawn_critical_async_with_shutdown("block_discovery", move |shutdown| {
            discovery_task(fetcher, ops, height_tx, params, metrics, shutdown)
        });
    }
}

async fn discovery_task<F: HeightFetcher>(
    fetcher: Arc<F>,
    ops: Arc<ScannerOps>,
    height_tx: mpsc::Sender<i64>,
    params: ScannerParams,
    metrics: Arc<BifrostMetrics>,
    shutdown: ShutdownGuard,
) -> anyhow::Result<()> {
    let mut pos = match ops.get_scan_pos_async().await {
        Ok(Some(pos)) => pos,
        Ok(None) => params.start_pos,
        Err(err) => {
            error!(%err, start = %params.start_pos, "failed to read scan position");
            params.start_pos
        }
    };
    info!(%pos, "starting block discovery");
    metrics.current_position.set(pos);

    // Pick up whatever the previous run left unfinished.
    for height in ops.get_blocks_for_retry_async(false).await? {
        if !publish(&height_tx, height, &shutdown).await {
            return Ok(());
        }
    }

    while !shutdown.should_shutdown() {
        let tip = match fetcher.fetch_tip().await {
            Ok(tip) => tip,
            Err(err) => {
                warn!(%err, "failed to fetch chain tip");
                metrics
                    .block_scanner_errors
                    .with_label_values(&["fetch_tip"])
                    .inc();
                sleep_or_shutdown(params.discover_backoff, &shutdown).await;
                continue;
            }
        };

        if tip <= pos {
            trace!(%tip, %pos, "no new blocks");
            sleep_or_shutdown(params.discover_backoff, &shutdown).await;
            continue;
        }

        match scan_range(&ops, &height_tx, pos, tip, &metrics, &shutdown).await {
            Ok(Some(last)) => pos = last,
            Ok(None) => break,
            Err(err) => {
                error!(%err, %pos, "block discovery stopped");
                return Err(err.into());
            }
        }
    }

    info!(%pos, "block discovery exiting");
    Ok(())
}

/// Publishes `(pos, tip]`. Returns the new position, or `None` once the
/// scanner is winding down.
async fn scan_range(
    ops: &ScannerOps,
    height_tx: &mpsc::Sender<i64>,
    pos: i64,
    tip: i64,
    metrics: &BifrostMetrics,
    shutdown: &ShutdownGuard,
) -> ScannerResult<Option<i64>> {
    for height in pos + 1..=tip {
        ops.set_block_scan_status_async(height, BlockScanStatus::NotStarted)
            .await?;
        if !publish(height_tx, height, shutdown).await {
            return Ok(None);
        }
        ops.set_scan_pos_async(height).await?;
        metrics.current_position.set(height);
    }
    Ok(Some(tip))
}

async fn retry_failed_blocks_task(
    ops: Arc<ScannerOps>,
    height_tx: mpsc::Sender<i64>,
    interval: Duration,
    metrics: Arc<BifrostMetrics>,
    shutdown: ShutdownGuard,
) -> anyhow::Result<()> {
    loop {
        sleep_or_shutdown(interval, &shutdown).await;
        if shutdown.should_shutdown() {
            return Ok(());
        }

        let failed = ops.get_blocks_for_retry_async(true).await?;
        if !failed.is_empty() {
            debug!(count = failed.len(), "retrying failed blocks");
            metrics.total_retry_blocks.inc_by(failed.len() as u64);
        }

        for height in failed {
            // Queued heights leave the failed set so a slow queue does not
            // get them twice.
            ops.set_block_scan_status_async(height, BlockScanStatus::NotStarted)
                .await?;
            if !publish(&height_tx, height, &shutdown).await {
                return Ok(());
            }
        }
    }
}

async fn block_worker_task<H: BlockHandler>(
    handler: Arc<H>,
    ops: Arc<ScannerOps>,
    height_rx: HeightReceiver,
    metrics: Arc<BifrostMetrics>,
    shutdown: ShutdownGuard,
) -> anyhow::Result<()> {
    loop {
        let height = tokio::select! {
            _ = shutdown.wait_for_shutdown() => break,
            height = next_height(&height_rx) => match height {
                Some(height) => height,
                None => break,
            },
        };

        process_height(handler.as_ref(), &ops, &metrics, height)
            .instrument(debug_span!("block", %height))
            .await?;
    }

    Ok(())
}

async fn next_height(height_rx: &HeightReceiver) -> Option<i64> {
    height_rx.lock().await.recv().await
}

async fn process_height<H: BlockHandler>(
    handler: &H,
    ops: &ScannerOps,
    metrics: &BifrostMetrics,
    height: i64,
) -> ScannerResult<()> {
    ops.set_block_scan_status_async(height, BlockScanStatus::Processing)
        .await?;

    match handler.handle_block(height).await {
        Ok(()) => {
            ops.remove_block_status_async(height).await?;
            metrics.total_block_scanned.inc();
            debug!(%height, "processed block");
        }
        Err(BlockError::Retry(err)) => {
            warn!(%height, err = %format!("{err:#}"), "failed to process block");
            metrics
                .block_scanner_errors
                .with_label_values(&["handle_block"])
                .inc();
            ops.set_block_scan_status_async(height, BlockScanStatus::Failed)
                .await?;
        }
        Err(BlockError::Fatal(err)) => {
            error!(%height, err = %format!("{err:#}"), "block handler failed");
            return Err(ScannerError::Handler(err));
        }
    }
    Ok(())
}

/// Returns false when the queue is closed or shutdown was signalled.
async fn publish(height_tx: &mpsc::Sender<i64>, height: i64, shutdown: &ShutdownGuard) -> bool {
    tokio::select! {
        _ = shutdown.wait_for_shutdown() => false,
        res = height_tx.send(height) => res.is_ok(),
    }
}

async fn sleep_or_shutdown(dur: Duration, shutdown: &ShutdownGuard) {
    tokio::select! {
        _ = shutdown.wait_for_shutdown() => {}
        _ = tokio::time::sleep(dur) => {}
    }
}
