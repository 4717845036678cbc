use std::{sync::Arc, time::Duration};

use bifrost_binance::{
    keys::{KeyManager, LocalKeyManager, TssKeyManager},
    BinanceClient,
};
use bifrost_blockscanner::{BlockScanner, RpcBlockHeightFetcher, ScannerParams};
use bifrost_common::{
    http::HttpClient,
    logging::{self, LoggerConfig},
    metrics,
};
use bifrost_config::{SignerConfig, SigningMode};
use bifrost_primitives::keys::{Address, Network, PubKey};
use bifrost_rocksdb::{open_rocksdb_database, DbOpsConfig, ScannerDb, TxOutDb};
use bifrost_signer::{OutboundHandler, Signer, SignerParams};
use bifrost_storage::ops;
use bifrost_tasks::{ShutdownSignal, TaskManager};
use bifrost_thorclient::{keys::ChainKeys, ThorchainClient, ThorchainRpc, WhitelistPolicy};
use tracing::*;
use uuid::Uuid;

use crate::{args::Args, errors::InitError, keys::SignerKeys};

mod args;
mod errors;
mod keys;

/// Threads serving blocking rocksdb calls.
const DB_POOL_SIZE: usize = 2;

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
        .thread_name("signer-rt")
        .build()
        .map_err(InitError::Runtime)?;

    // Init the logging before we do anything else.
    init_logging(&args);

    let config = bifrost_config::load_signer_config(&args.cfg).map_err(InitError::from)?;
    let network = config.binance.network();
    info!(?network, dex = %config.binance.dex_host, "starting signer");

    let rbdb = open_rocksdb_database(&config.signer_db_path)?;
    let ops_config = DbOpsConfig::new(config.db_retry_count);
    let pool = threadpool::ThreadPool::with_name("signer-db".to_owned(), DB_POOL_SIZE);

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
    let txout_ops =
        Arc::new(ops::txout::Context::new(Arc::new(TxOutDb::new(rbdb))).into_ops(pool));

    let http = build_http_client(&config, task_manager.shutdown_signal())?;
    let chain_keys = ChainKeys::load(&config.thorchain.signer_key_path()).map_err(InitError::from)?;
    let thorchain = Arc::new(ThorchainClient::new(
        http.clone(),
        &config.thorchain.chain_url(),
        &config.thorchain.chain_id,
        Arc::new(chain_keys),
    ));
    // Broadcasting and tx lookups only need the DEX API.
    let binance = Arc::new(BinanceClient::new(http.clone(), "", &config.binance.dex_url()));
    let keys = build_key_manager(&config, http.clone())?;

    let (signer_address, pool_key) = runtime.block_on(async {
        WhitelistPolicy::default()
            .wait(thorchain.as_ref())
            .await
            .map_err(InitError::from)?;
        info!("node account is whitelisted");

        resolve_signer(
            config.binance.pool_address.as_deref(),
            keys.pub_key(),
            network,
            thorchain.as_ref(),
        )
        .await
    })?;
    info!(address = %signer_address, pool_key = ?pool_key.map(|k| k.to_string()), "resolved signer");
    let keys = Arc::new(keys.with_expected_key(pool_key));

    let height_tx = Signer::new(
        binance,
        keys,
        thorchain.clone(),
        txout_ops.clone(),
        SignerParams {
            signer_address,
            network,
            rune_symbol: config.binance.rune_symbol.clone(),
            max_broadcast_retries: config.binance.max_broadcast_retries,
            retry_interval: config.retry_interval(),
        },
        metrics.clone(),
    )
    .start(&executor);

    let scanner_url = config.scanner_rpc_url();
    let handler = Arc::new(OutboundHandler::new(
        thorchain,
        txout_ops,
        pool_key,
        height_tx,
        metrics.clone(),
    ));
    let fetcher = Arc::new(RpcBlockHeightFetcher::new(http, &scanner_url));
    BlockScanner::new(
        fetcher,
        handler,
        scanner_ops,
        ScannerParams {
            start_pos: (config.block_scanner.start_block_height - 1).max(0),
            processors: config.block_scanner.block_scan_processors,
            discover_backoff: config.block_scanner.discover_backoff(),
            retry_interval: config.block_scanner.retry_interval(),
        },
        metrics,
    )
    .start(&executor);

    info!(scanner = %scanner_url, "init finished, signer running");

    task_manager.start_signal_listeners();
    task_manager.monitor(Some(Duration::from_secs(5)))?;

    info!("exiting");
    Ok(())
}

fn init_logging(args: &Args) {
    let mut lconfig = LoggerConfig::with_base_name("signer");
    lconfig.set_level(args.log_level.as_str());
    lconfig.set_pretty(args.pretty_log);
    logging::init(lconfig);
}

fn build_http_client(
    config: &SignerConfig,
    shutdown: ShutdownSignal,
) -> Result<HttpClient, InitError> {
    let http_config = config.back_off.http_client_config(
        config.block_scanner.http_request_timeout(),
        config.block_scanner.max_http_request_retry,
    );
    Ok(HttpClient::new(http_config, shutdown)?)
}

fn build_key_manager(config: &SignerConfig, http: HttpClient) -> Result<SignerKeys, InitError> {
    match config.signing_mode()? {
        SigningMode::Local { private_key } => {
            Ok(SignerKeys::Local(LocalKeyManager::from_hex(private_key)?))
        }
        SigningMode::Tss(tss) => {
            let node_id = tss
                .node_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            info!(url = %tss.url(), %node_id, "signing through TSS");
            Ok(SignerKeys::Tss(TssKeyManager::new(http, tss.url(), node_id)))
        }
    }
}

/// Works out the address outbound transfers are paid from, and the pool key
/// the outbound array is requested for.
///
/// A configured address must match the signing key when one is known. With
/// neither, the chain's current pool key is assumed to be ours.
async fn resolve_signer<R: ThorchainRpc + ?Sized>(
    configured: Option<&str>,
    key: Option<PubKey>,
    network: Network,
    rpc: &R,
) -> Result<(Address, Option<PubKey>), InitError> {
    let configured = configured
        .filter(|a| !a.is_empty())
        .map(Address::new)
        .transpose()?;

    let pool_key = match (key, &configured) {
        (Some(key), _) => Some(key),
        (None, Some(_)) => None,
        (None, None) => {
            let pools = rpc.get_pool_addresses().await?;
            Some(pools.current.ok_or(InitError::NoPoolKey)?)
        }
    };
    let derived = pool_key.map(|k| k.address(network.hrp())).transpose()?;

    match (configured, derived) {
        (Some(configured), Some(derived)) if configured != derived => {
            Err(InitError::PoolAddressMismatch {
                configured,
                derived,
            })
        }
        (Some(address), _) | (None, Some(address)) => Ok((address, pool_key)),
        (None, None) => Err(InitError::NoPoolKey),
    }
}
