//! Prometheus counters of both services, and the `/metrics` endpoint
//! exposing them.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bifrost_tasks::{ShutdownGuard, TaskExecutor};
use hyper::{
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
pub use prometheus::{Error as MetricsError, Registry};
use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, Histogram,
    IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use tracing::*;

const ERROR_LABELS: &[&str] = &["error_name"];

#[derive(Clone, Debug)]
pub struct BifrostMetrics {
    // block scanner
    pub total_block_scanned: IntCounter,
    pub current_position: IntGauge,
    pub total_retry_blocks: IntCounter,
    pub block_scanner_errors: IntCounterVec,

    // binance blocks
    pub block_without_tx: IntCounter,
    pub block_with_tx_in: IntCounter,
    pub block_no_tx_in: IntCounter,
    pub binance_block_scan_errors: IntCounterVec,
    pub search_tx_duration: Histogram,

    // thorchain blocks
    pub block_no_tx_out: IntCounter,
    pub thorchain_block_scan_errors: IntCounterVec,

    pub tx_to_thorchain: IntCounter,
    pub send_to_thorchain_duration: Histogram,
    pub observer_errors: IntCounterVec,
    pub pool_address_manager_errors: IntCounterVec,

    pub tx_to_binance_signed: IntCounter,
    pub tx_to_binance_broadcast: IntCounter,
    pub sign_and_broadcast_duration: Histogram,
    pub signer_errors: IntCounterVec,
}

impl BifrostMetrics {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        Ok(Self {
            total_block_scanned: register_int_counter_with_registry!(
                "block_scanner_total_block_scanned",
                "Total number of blocks scanned",
                registry
            )?,
            current_position: register_int_gauge_with_registry!(
                "block_scanner_current_position",
                "Last height handed to the block workers",
                registry
            )?,
            total_retry_blocks: register_int_counter_with_registry!(
                "block_scanner_total_retry_blocks",
                "Total number of failed blocks queued again",
                registry
            )?,
            block_scanner_errors: register_int_counter_vec_with_registry!(
                "block_scanner_errors",
                "Errors in the block scanner, by error",
                ERROR_LABELS,
                registry
            )?,
            block_without_tx: register_int_counter_with_registry!(
                "binance_block_without_tx",
                "Binance blocks without any tx",
                registry
            )?,
            block_with_tx_in: register_int_counter_with_registry!(
                "binance_block_with_tx_in",
                "Binance blocks holding transfers to a pool address",
                registry
            )?,
            block_no_tx_in: register_int_counter_with_registry!(
                "binance_block_no_tx_in",
                "Binance blocks with txs, none of them to a pool address",
                registry
            )?,
            binance_block_scan_errors: register_int_counter_vec_with_registry!(
                "binance_block_scan_errors",
                "Errors extracting Binance blocks, by error",
                ERROR_LABELS,
                registry
            )?,
            search_tx_duration: register_histogram_with_registry!(
                "binance_search_tx_duration_seconds",
                "Time spent collecting the txs of one Binance block",
                registry
            )?,
            block_no_tx_out: register_int_counter_with_registry!(
                "thorchain_block_no_tx_out",
                "THORChain blocks without an outbound for this signer",
                registry
            )?,
            thorchain_block_scan_errors: register_int_counter_vec_with_registry!(
                "thorchain_block_scan_errors",
                "Errors fetching THORChain outbound arrays, by error",
                ERROR_LABELS,
                registry
            )?,
            tx_to_thorchain: register_int_counter_with_registry!(
                "observer_tx_to_thorchain",
                "Observation batches accepted by THORChain",
                registry
            )?,
            send_to_thorchain_duration: register_histogram_with_registry!(
                "observer_send_to_thorchain_duration_seconds",
                "Time spent signing and posting one observation batch",
                registry
            )?,
            observer_errors: register_int_counter_vec_with_registry!(
                "observer_errors",
                "Errors in the observer, by error",
                ERROR_LABELS,
                registry
            )?,
            pool_address_manager_errors: register_int_counter_vec_with_registry!(
                "observer_pool_address_manager_errors",
                "Errors refreshing the pool addresses, by error",
                ERROR_LABELS,
                registry
            )?,
            tx_to_binance_signed: register_int_counter_with_registry!(
                "signer_tx_to_binance_signed",
                "Outbound txs signed",
                registry
            )?,
            tx_to_binance_broadcast: register_int_counter_with_registry!(
                "signer_tx_to_binance_broadcast",
                "Outbound txs accepted by the Binance node",
                registry
            )?,
            sign_and_broadcast_duration: register_histogram_with_registry!(
                "signer_sign_and_broadcast_duration_seconds",
                "Time spent signing and broadcasting one outbound",
                registry
            )?,
            signer_errors: register_int_counter_vec_with_registry!(
                "signer_errors",
                "Errors in the signer, by error",
                ERROR_LABELS,
                registry
            )?,
        })
    }

    #[cfg(any(test, feature = "test_utils"))]
    pub fn new_for_testing() -> Self {
        let registry = Registry::new();
        Self::new(&registry).unwrap()
    }
}

/// Registers the counters in a fresh registry. With `listen` set, also
/// spawns the task serving them.
pub fn init(
    listen: Option<SocketAddr>,
    executor: &TaskExecutor,
) -> prometheus::Result<Arc<BifrostMetrics>> {
    let registry = Registry::new();
    let metrics = Arc::new(BifrostMetrics::new(&registry)?);

    if let Some(addr) = listen {
        executor.spawn_critical_async_with_shutdown("metrics_server", move |shutdown| async move {
            serve(addr, registry, shutdown).await?;
            Ok(())
        });
    }
    Ok(metrics)
}

/// Everything in `registry`, in the text exposition format.
pub fn render(registry: &Registry) -> prometheus::Result<String> {
    let mut buf = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buf)?;
    String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

fn respond(registry: &Registry, req: &Request<Body>) -> Response<Body> {
    let (status, body) = if req.method() != Method::GET || req.uri().path() != "/metrics" {
        (StatusCode::NOT_FOUND, String::new())
    } else {
        match render(registry) {
            Ok(text) => (StatusCode::OK, text),
            Err(err) => {
                warn!(%err, "failed to encode metrics");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    };

    let mut resp = Response::new(Body::from(body));
    *resp.status_mut() = status;
    resp
}

/// Serves `GET /metrics` on `addr` until shutdown.
pub async fn serve(
    addr: SocketAddr,
    registry: Registry,
    shutdown: ShutdownGuard,
) -> Result<(), hyper::Error> {
    let make_svc = make_service_fn(move |_conn| {
        let registry = registry.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let resp = respond(&registry, &req);
                async move { Ok::<_, Infallible>(resp) }
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    info!(%addr, "serving metrics");
    server
        .with_graceful_shutdown(async move { shutdown.wait_for_shutdown().await })
        .await
}
