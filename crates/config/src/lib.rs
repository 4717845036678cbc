//! Service configuration, loaded from TOML and then patched from the
//! environment.

pub mod errors;
pub mod observer;
pub mod sections;
pub mod signer;

use std::{fs, path::Path};

use serde::de::DeserializeOwned;
use tracing::*;

pub use errors::{ConfigError, ConfigResult};
pub use observer::ObserverConfig;
pub use sections::{
    BackOffConfig, BinanceConfig, BlockScannerConfig, MetricsConfig, ThorchainConfig, TssConfig,
};
pub use signer::{SignerConfig, SigningMode};

fn load_toml<T: DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let raw = fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_owned(), e))?;
    toml::from_str(&raw).map_err(|e| ConfigError::Parse(path.to_owned(), e))
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Loads the observer config from `path`, applies environment overrides and
/// validates the result.
pub fn load_observer_config(path: &Path) -> ConfigResult<ObserverConfig> {
    let mut config: ObserverConfig = load_toml(path)?;
    config.apply_env_overrides(env_lookup);
    config.validate()?;
    debug!(path = %path.display(), "loaded observer config");
    Ok(config)
}

/// Loads the signer config from `path`, applies environment overrides and
/// validates the result.
pub fn load_signer_config(path: &Path) -> ConfigResult<SignerConfig> {
    let mut config: SignerConfig = load_toml(path)?;
    config.apply_env_overrides(env_lookup);
    config.validate()?;
    debug!(path = %path.display(), "loaded signer config");
    Ok(config)
}
