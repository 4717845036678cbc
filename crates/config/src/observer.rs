use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    errors::{ConfigError, ConfigResult},
    sections::{BackOffConfig, BinanceConfig, BlockScannerConfig, MetricsConfig, ThorchainConfig},
};

const DEFAULT_OBSERVER_DB_PATH: &str = "observer_data";
const DEFAULT_RETRY_INTERVAL_MS: u64 = 2_000;
const DEFAULT_MESSAGE_PROCESSORS: usize = 2;
const DEFAULT_POOL_REFRESH_INTERVAL_MS: u64 = 60_000;
const DEFAULT_DB_RETRY_COUNT: u16 = 5;

fn default_observer_db_path() -> PathBuf {
    DEFAULT_OBSERVER_DB_PATH.into()
}

fn default_retry_interval_ms() -> u64 {
    DEFAULT_RETRY_INTERVAL_MS
}

fn default_message_processors() -> usize {
    DEFAULT_MESSAGE_PROCESSORS
}

fn default_pool_refresh_interval_ms() -> u64 {
    DEFAULT_POOL_REFRESH_INTERVAL_MS
}

fn default_db_retry_count() -> u16 {
    DEFAULT_DB_RETRY_COUNT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    #[serde(default = "default_observer_db_path")]
    pub observer_db_path: PathBuf,

    /// For optimistic transactions, how many times to retry if a write fails.
    #[serde(default = "default_db_retry_count")]
    pub db_retry_count: u16,

    /// How often failed observation batches are resubmitted.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Number of workers submitting observation batches.
    #[serde(default = "default_message_processors")]
    pub message_processors: usize,

    #[serde(default = "default_pool_refresh_interval_ms")]
    pub pool_refresh_interval_ms: u64,

    #[serde(default)]
    pub block_scanner: BlockScannerConfig,

    #[serde(default)]
    pub thorchain: ThorchainConfig,

    #[serde(default)]
    pub binance: BinanceConfig,

    #[serde(default)]
    pub back_off: BackOffConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl ObserverConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn pool_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.pool_refresh_interval_ms)
    }

    /// Applies the legacy environment overrides through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("DEX_HOST") {
            self.binance.dex_host = v;
        }
        if let Some(v) = lookup("RPC_HOST") {
            self.block_scanner.rpc_host = v;
        }
        if let Some(v) = lookup("CHAIN_HOST") {
            self.thorchain.chain_host = v;
        }
        if let Some(v) = lookup("SIGNER_PASSWD") {
            self.thorchain.signer_passwd = v;
        }
        if let Some(v) = lookup("LEVEL_DB_OBSERVER_PATH") {
            self.observer_db_path = v.into();
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.block_scanner.rpc_host.is_empty() {
            return Err(ConfigError::Invalid("block_scanner.rpc_host is empty".into()));
        }
        if self.block_scanner.block_scan_processors == 0 {
            return Err(ConfigError::Invalid(
                "block_scanner.block_scan_processors must be positive".into(),
            ));
        }
        if self.message_processors == 0 {
            return Err(ConfigError::Invalid(
                "message_processors must be positive".into(),
            ));
        }
        if self.binance.dex_host.is_empty() {
            return Err(ConfigError::Invalid("binance.dex_host is empty".into()));
        }
        if self.thorchain.signer_passwd.is_empty() {
            return Err(ConfigError::Invalid("thorchain.signer_passwd is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_config_load() {
        let config_string = r#"
            observer_db_path = "/var/bifrost/observer"
            message_processors = 4

            [block_scanner]
            rpc_host = "data-seed-pre-0-s1.binance.org"
            start_block_height = 100
            block_scan_processors = 3

            [thorchain]
            chain_host = "thornode:1317"
            signer_name = "observer"
            signer_passwd = "password"

            [binance]
            dex_host = "testnet-dex.binance.org"
        "#;

        let config = toml::from_str::<ObserverConfig>(config_string);
        assert!(
            config.is_ok(),
            "should be able to load observer TOML config but got: {:?}",
            config.err()
        );

        let config = config.unwrap();
        assert_eq!(config.message_processors, 4);
        assert_eq!(config.block_scanner.block_scan_processors, 3);
        assert_eq!(config.block_scanner.http_request_timeout_ms, 30_000);
        assert_eq!(config.thorchain.chain_id, "thorchain");
        assert_eq!(config.retry_interval(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_from_minimal_config() {
        let config = toml::from_str::<ObserverConfig>("").unwrap();

        assert_eq!(config.observer_db_path, PathBuf::from("observer_data"));
        assert_eq!(config.thorchain.chain_host, "localhost:1317");
        assert_eq!(config.block_scanner.max_http_request_retry, 10);
        assert_eq!(config.pool_refresh_interval(), Duration::from_secs(60));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DEX_HOST", "dex.binance.org"),
            ("RPC_HOST", "seed1.binance.org"),
            ("CHAIN_HOST", "thornode:1317"),
            ("SIGNER_PASSWD", "secret"),
            ("LEVEL_DB_OBSERVER_PATH", "/tmp/obs"),
        ]
        .into_iter()
        .collect();

        let mut config = toml::from_str::<ObserverConfig>("").unwrap();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.binance.dex_host, "dex.binance.org");
        assert_eq!(config.block_scanner.rpc_host, "seed1.binance.org");
        assert_eq!(config.thorchain.chain_host, "thornode:1317");
        assert_eq!(config.observer_db_path, PathBuf::from("/tmp/obs"));
        assert!(config.validate().is_ok());
    }
}
