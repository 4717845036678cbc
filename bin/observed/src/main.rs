use std::{sync::Arc, time::Duration};

use bifrost_binance::BinanceClient;
use bifrost_blockscanner::{BlockScanner, RpcBlockHeightFetcher, ScannerParams};
use bifrost_common::{
    http::HttpClient,
    logging::{self, LoggerConfig},
    metrics,
};
use bifrost_config::{BlockScannerConfig, ObserverConfig};
use bifrost_observer::{
    BinanceBlockHandler, ObservationPipeline, PipelineParams, PoolAddressManager,
};
use bifrost_primitives::chain::Chain;
use bifrost_rocksdb::{open_rocksdb_database, DbOpsConfig, ScannerDb, TxInDb};
use bifrost_storage::ops;
use bifrost_tasks::{ShutdownSignal, TaskManager};
use bifrost_thorclient::{keys::ChainKeys, ThorchainClient, ThorchainRpc, WhitelistPolicy};
use tracing::*;

use crate::{args::Args, errors::InitError};

mod args;
mod errors;

/// Threads serving blocking rocksdb calls.
const DB_POOL_SIZE: usize = 4;

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    if args.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if let Err(e) = main_inner(args) {
        eprintln!("FATAL ERROR: {e:#}");
        return Err(e);
    }

    Ok(())
}

fn main_inner(args: Args) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("observer-rt")
        .build()
        .map_err(InitError::Runtime)?;

    // Init the logging before we do anything else.
    init_logging(&args);

    let config = bifrost_config::load_observer_config(&args.cfg).map_err(InitError::from)?;
    let network = config.binance.network();
    info!(?network, scanner = %config.block_scanner.rpc_host, "starting observer");

    let rbdb = open_rocksdb_database(&config.observer_db_path)?;
    let ops_config = DbOpsConfig::new(config.db_retry_count);
    let pool = threadpool::ThreadPool::with_name("observer-db".to_owned(), DB_POOL_SIZE);

    let task_manager = TaskManager::new(runtime.handle().clone());
    let executor = task_manager.executor();

    let listen = config
        .metrics
        .enabled
        .then(|| config.metrics.listen_addr());
    let metrics = metrics::init(listen, &executor).map_err(InitError::from)?;

    let scanner_ops = Arc::new(
        ops::scanner::Context::new(Arc::new(ScannerDb::new(rbdb.clone(), ops_config)))
            .into_ops(pool.clone()),
    );
    let txin_ops = Arc::new(ops::txin::Context::new(Arc::new(TxInDb::new(rbdb))).into_ops(pool));

    let http = build_http_client(&config, task_manager.shutdown_signal())?;
    let keys = ChainKeys::load(&config.thorchain.signer_key_path()).map_err(InitError::from)?;
    let thorchain = Arc::new(ThorchainClient::new(
        http.clone(),
        &config.thorchain.chain_url(),
        &config.thorchain.chain_id,
        Arc::new(keys),
    ));
    let scanner_url = config.block_scanner.rpc_url("https");
    let binance = Arc::new(BinanceClient::new(
        http.clone(),
        &scanner_url,
        &config.binance.dex_url(),
    ));

    let pools = Arc::new(PoolAddressManager::new(network));
    let start_pos = runtime.block_on(async {
        WhitelistPolicy::default()
            .wait(thorchain.as_ref())
            .await
            .map_err(InitError::from)?;
        info!("node account is whitelisted");

        if let Err(err) = pools.refresh(thorchain.as_ref()).await {
            warn!(%err, "initial pool refresh failed, blocks wait for the refresh task");
        }

        resolve_start_pos(&config.block_scanner, thorchain.as_ref()).await
    })?;
    info!(%start_pos, "resolved scan start");

    pools.start(
        thorchain.clone(),
        config.pool_refresh_interval(),
        metrics.clone(),
        &executor,
    );

    let tx_in_tx = ObservationPipeline::new(
        thorchain,
        txin_ops.clone(),
        PipelineParams {
            workers: config.message_processors,
            retry_interval: config.retry_interval(),
        },
        metrics.clone(),
    )
    .start(&executor);

    let handler = Arc::new(BinanceBlockHandler::new(
        binance,
        pools,
        txin_ops,
        tx_in_tx,
        metrics.clone(),
    ));
    let fetcher = Arc::new(RpcBlockHeightFetcher::new(http, &scanner_url));
    BlockScanner::new(
        fetcher,
        handler,
        scanner_ops,
        ScannerParams {
            start_pos,
            processors: config.block_scanner.block_scan_processors,
            discover_backoff: config.block_scanner.discover_backoff(),
            retry_interval: config.block_scanner.retry_interval(),
        },
        metrics,
    )
    .start(&executor);

    info!("init finished, observer running");

    task_manager.start_signal_listeners();
    task_manager.monitor(Some(Duration::from_secs(5)))?;

    info!("exiting");
    Ok(())
}

fn init_logging(args: &Args) {
    let mut lconfig = LoggerConfig::with_base_name("observer");
    lconfig.set_level(args.log_level.as_str());
    lconfig.set_pretty(args.pretty_log);
    logging::init(lconfig);
}

fn build_http_client(
    config: &ObserverConfig,
    shutdown: ShutdownSignal,
) -> Result<HttpClient, InitError> {
    let http_config = config.back_off.http_client_config(
        config.block_scanner.http_request_timeout(),
        config.block_scanner.max_http_request_retry,
    );
    Ok(HttpClient::new(http_config, shutdown)?)
}

/// Last height treated as scanned when the store has no position yet.
async fn resolve_start_pos<R: ThorchainRpc + ?Sized>(
    config: &BlockScannerConfig,
    rpc: &R,
) -> Result<i64, InitError> {
    let configured = (config.start_block_height - 1).max(0);
    if config.enforce_block_height {
        return Ok(configured);
    }

    let last_observed = rpc.get_last_observed_height(Chain::bnb()).await?;
    if last_observed > 0 {
        debug!(%last_observed, "resuming from the network's last observation");
        Ok(last_observed)
    } else {
        Ok(configured)
    }
}
