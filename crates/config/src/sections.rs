//! Config sections shared by both services.

use std::{
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use bifrost_common::{
    http::HttpClientConfig,
    retry::{policies::ExponentialBackoff, RetryLimits},
};
use bifrost_primitives::keys::Network;
use serde::{Deserialize, Serialize};

const DEFAULT_BLOCK_SCAN_PROCESSORS: usize = 2;
const DEFAULT_HTTP_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_HTTP_REQUEST_RETRY: u16 = 10;
const DEFAULT_DISCOVER_BACKOFF_MS: u64 = 1_000;
const DEFAULT_BLOCK_RETRY_INTERVAL_MS: u64 = 1_000;

const DEFAULT_CHAIN_ID: &str = "thorchain";
const DEFAULT_CHAIN_HOST: &str = "localhost:1317";
const DEFAULT_SIGNER_NAME: &str = "thorchain";

const DEFAULT_DEX_HOST: &str = "testnet-dex.binance.org";
const DEFAULT_RUNE_SYMBOL: &str = "RUNE-A1F";
const DEFAULT_MAX_BROADCAST_RETRIES: u32 = 3;

const DEFAULT_METRICS_PORT: u16 = 9000;

fn default_block_scan_processors() -> usize {
    DEFAULT_BLOCK_SCAN_PROCESSORS
}

fn default_http_request_timeout_ms() -> u64 {
    DEFAULT_HTTP_REQUEST_TIMEOUT_MS
}

fn default_max_http_request_retry() -> u16 {
    DEFAULT_MAX_HTTP_REQUEST_RETRY
}

fn default_discover_backoff_ms() -> u64 {
    DEFAULT_DISCOVER_BACKOFF_MS
}

fn default_block_retry_interval_ms() -> u64 {
    DEFAULT_BLOCK_RETRY_INTERVAL_MS
}

fn default_https() -> String {
    "https".to_string()
}

fn default_http() -> String {
    "http".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockScannerConfig {
    /// Host (and optional port) of the RPC node whose tip is followed.
    #[serde(default)]
    pub rpc_host: String,

    /// Scheme of `rpc_host`, each service picks its own default when unset.
    #[serde(default)]
    pub rpc_scheme: Option<String>,

    /// Height to resume from when nothing is persisted yet.
    #[serde(default)]
    pub start_block_height: i64,

    /// Use `start_block_height` as is instead of asking the chain.
    #[serde(default)]
    pub enforce_block_height: bool,

    #[serde(default = "default_block_scan_processors")]
    pub block_scan_processors: usize,

    #[serde(default = "default_http_request_timeout_ms")]
    pub http_request_timeout_ms: u64,

    #[serde(default = "default_max_http_request_retry")]
    pub max_http_request_retry: u16,

    #[serde(default = "default_discover_backoff_ms")]
    pub block_height_discover_backoff_ms: u64,

    #[serde(default = "default_block_retry_interval_ms")]
    pub block_retry_interval_ms: u64,
}

impl Default for BlockScannerConfig {
    fn default() -> Self {
        Self {
            rpc_host: String::new(),
            rpc_scheme: None,
            start_block_height: 0,
            enforce_block_height: false,
            block_scan_processors: DEFAULT_BLOCK_SCAN_PROCESSORS,
            http_request_timeout_ms: DEFAULT_HTTP_REQUEST_TIMEOUT_MS,
            max_http_request_retry: DEFAULT_MAX_HTTP_REQUEST_RETRY,
            block_height_discover_backoff_ms: DEFAULT_DISCOVER_BACKOFF_MS,
            block_retry_interval_ms: DEFAULT_BLOCK_RETRY_INTERVAL_MS,
        }
    }
}

impl BlockScannerConfig {
    pub fn rpc_url(&self, default_scheme: &str) -> String {
        let scheme = self.rpc_scheme.as_deref().unwrap_or(default_scheme);
        format!("{scheme}://{}", self.rpc_host)
    }

    pub fn discover_backoff(&self) -> Duration {
        Duration::from_millis(self.block_height_discover_backoff_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.block_retry_interval_ms)
    }

    pub fn http_request_timeout(&self) -> Duration {
        Duration::from_millis(self.http_request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThorchainConfig {
    pub chain_id: String,
    pub chain_host: String,
    pub chain_scheme: String,

    /// Directory holding the `{signer_name}.key` file.
    pub chain_home_folder: PathBuf,
    pub signer_name: String,
    pub signer_passwd: String,
}

impl Default for ThorchainConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID.to_string(),
            chain_host: DEFAULT_CHAIN_HOST.to_string(),
            chain_scheme: default_http(),
            chain_home_folder: PathBuf::from("."),
            signer_name: DEFAULT_SIGNER_NAME.to_string(),
            signer_passwd: String::new(),
        }
    }
}

impl ThorchainConfig {
    pub fn chain_url(&self) -> String {
        format!("{}://{}", self.chain_scheme, self.chain_host)
    }

    pub fn signer_key_path(&self) -> PathBuf {
        self.chain_home_folder
            .join(format!("{}.key", self.signer_name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BinanceConfig {
    pub dex_host: String,

    #[serde(default = "default_https")]
    pub dex_scheme: String,

    /// Derived from `dex_host` when unset.
    pub network: Option<Network>,

    /// Symbol outbound RUNE is rewritten to.
    pub rune_symbol: String,

    /// Hex encoded secp256k1 key used when no TSS endpoint is configured.
    pub private_key: Option<String>,

    /// Expected signer address, checked against the signing key at startup.
    pub pool_address: Option<String>,

    pub max_broadcast_retries: u32,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            dex_host: DEFAULT_DEX_HOST.to_string(),
            dex_scheme: default_https(),
            network: None,
            rune_symbol: DEFAULT_RUNE_SYMBOL.to_string(),
            private_key: None,
            pool_address: None,
            max_broadcast_retries: DEFAULT_MAX_BROADCAST_RETRIES,
        }
    }
}

impl BinanceConfig {
    pub fn dex_url(&self) -> String {
        format!("{}://{}", self.dex_scheme, self.dex_host)
    }

    pub fn network(&self) -> Network {
        self.network
            .unwrap_or_else(|| Network::from_dex_host(&self.dex_host))
    }
}

/// Remote threshold signing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TssConfig {
    #[serde(default = "default_http")]
    pub scheme: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub node_id: Option<String>,
}

impl TssConfig {
    pub fn url(&self) -> String {
        format!("{}://{}:{}/", self.scheme, self.host, self.port)
    }
}

/// Exponential backoff applied to every remote call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackOffConfig {
    pub initial_interval_ms: u64,
    pub multiplier: f64,
    pub max_interval_ms: u64,
    pub max_elapsed_time_ms: u64,
}

impl Default for BackOffConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 500,
            multiplier: 1.5,
            max_interval_ms: 3 * 60 * 1_000,
            max_elapsed_time_ms: 15 * 60 * 1_000,
        }
    }
}

impl BackOffConfig {
    /// Builds the HTTP client settings for one remote endpoint.
    pub fn http_client_config(&self, request_timeout: Duration, max_attempts: u16) -> HttpClientConfig {
        // Fixed point with two decimals, negative or NaN multipliers become 1x.
        let multiplier = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            (self.multiplier * 100.0).round() as u64
        } else {
            100
        };

        HttpClientConfig {
            request_timeout,
            limits: RetryLimits {
                max_attempts: max_attempts.max(1),
                max_elapsed: Duration::from_millis(self.max_elapsed_time_ms),
            },
            backoff: ExponentialBackoff::new(self.initial_interval_ms, multiplier, 100)
                .with_max_delay_ms(self.max_interval_ms),
        }
    }
}

/// Prometheus endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_port: DEFAULT_METRICS_PORT,
        }
    }
}

impl MetricsConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.listen_port))
    }
}
