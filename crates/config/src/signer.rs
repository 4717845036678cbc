use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    errors::{ConfigError, ConfigResult},
    sections::{
        BackOffConfig, BinanceConfig, BlockScannerConfig, MetricsConfig, ThorchainConfig,
        TssConfig,
    },
};

const DEFAULT_SIGNER_DB_PATH: &str = "signer_db";
const DEFAULT_RETRY_INTERVAL_MS: u64 = 2_000;
const DEFAULT_DB_RETRY_COUNT: u16 = 5;

fn default_signer_db_path() -> PathBuf {
    DEFAULT_SIGNER_DB_PATH.into()
}

fn default_retry_interval_ms() -> u64 {
    DEFAULT_RETRY_INTERVAL_MS
}

fn default_db_retry_count() -> u16 {
    DEFAULT_DB_RETRY_COUNT
}

/// How outbound transactions get signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningMode<'a> {
    Local { private_key: &'a str },
    Tss(&'a TssConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    #[serde(default = "default_signer_db_path")]
    pub signer_db_path: PathBuf,

    /// For optimistic transactions, how many times to retry if a write fails.
    #[serde(default = "default_db_retry_count")]
    pub db_retry_count: u16,

    /// How often outbound batches that failed transiently are re-driven.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Follows the chain itself, `rpc_host` falls back to the chain host.
    #[serde(default)]
    pub block_scanner: BlockScannerConfig,

    #[serde(default)]
    pub thorchain: ThorchainConfig,

    #[serde(default)]
    pub binance: BinanceConfig,

    /// When present, signing is delegated to the TSS endpoint.
    #[serde(default)]
    pub tss: Option<TssConfig>,

    #[serde(default)]
    pub back_off: BackOffConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl SignerConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Base url of the node the outbound scanner follows.
    pub fn scanner_rpc_url(&self) -> String {
        if self.block_scanner.rpc_host.is_empty() {
            self.thorchain.chain_url()
        } else {
            self.block_scanner.rpc_url(&self.thorchain.chain_scheme)
        }
    }

    pub fn signing_mode(&self) -> ConfigResult<SigningMode<'_>> {
        match (&self.tss, self.binance.private_key.as_deref()) {
            (Some(tss), _) => Ok(SigningMode::Tss(tss)),
            (None, Some(private_key)) if !private_key.is_empty() => {
                Ok(SigningMode::Local { private_key })
            }
            _ => Err(ConfigError::Invalid(
                "either [tss] or binance.private_key must be set".into(),
            )),
        }
    }

    /// Applies the legacy environment overrides through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("POOL_ADDRESS") {
            self.binance.pool_address = Some(v);
        }
        if let Some(v) = lookup("DEX_HOST") {
            self.binance.dex_host = v;
        }
        if let Some(v) = lookup("PRIVATE_KEY") {
            self.binance.private_key = Some(v);
        }
        if let Some(v) = lookup("CHAIN_HOST") {
            self.thorchain.chain_host = v;
        }
        if let Some(v) = lookup("SIGNER_PASSWD") {
            self.thorchain.signer_passwd = v;
        }
        if let Some(v) = lookup("LEVEL_DB_SIGNER_PATH") {
            self.signer_db_path = v.into();
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.block_scanner.block_scan_processors == 0 {
            return Err(ConfigError::Invalid(
                "block_scanner.block_scan_processors must be positive".into(),
            ));
        }
        if self.binance.dex_host.is_empty() {
            return Err(ConfigError::Invalid("binance.dex_host is empty".into()));
        }
        if self.thorchain.signer_passwd.is_empty() {
            return Err(ConfigError::Invalid("thorchain.signer_passwd is empty".into()));
        }
        if let Some(tss) = &self.tss {
            if tss.host.is_empty() {
                return Err(ConfigError::Invalid("tss.host is empty".into()));
            }
            if tss.port == 0 {
                return Err(ConfigError::Invalid("tss.port not specified".into()));
            }
        }
        self.signing_mode()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_config_load_with_tss() {
        let config_string = r#"
            [thorchain]
            chain_host = "thornode:1317"
            signer_passwd = "password"

            [binance]
            dex_host = "testnet-dex.binance.org"
            rune_symbol = "RUNE-B1A"

            [tss]
            host = "tss"
            port = 4040
        "#;

        let config = toml::from_str::<SignerConfig>(config_string);
        assert!(
            config.is_ok(),
            "should be able to load signer TOML config but got: {:?}",
            config.err()
        );

        let config = config.unwrap();
        assert_eq!(config.signer_db_path, PathBuf::from("signer_db"));
        assert_eq!(config.binance.rune_symbol, "RUNE-B1A");
        assert_eq!(config.scanner_rpc_url(), "http://thornode:1317");
        assert!(matches!(config.signing_mode(), Ok(SigningMode::Tss(_))));
        assert_eq!(config.tss.as_ref().unwrap().url(), "http://tss:4040/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_signing_mode_requires_a_key() {
        let mut config = toml::from_str::<SignerConfig>(
            r#"
            [thorchain]
            signer_passwd = "password"
        "#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let env: HashMap<&str, &str> = [("PRIVATE_KEY", "aa"), ("LEVEL_DB_SIGNER_PATH", "/tmp/s")]
            .into_iter()
            .collect();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(
            config.signing_mode().unwrap(),
            SigningMode::Local { private_key: "aa" }
        );
        assert_eq!(config.signer_db_path, PathBuf::from("/tmp/s"));
        assert!(config.validate().is_ok());
    }
}
