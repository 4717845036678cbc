use bifrost_binance::keys::SignError;
use bifrost_primitives::{errors::ParseError, keys::Address};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum InitError {
    #[error("config: {0}")]
    Config(#[from] bifrost_config::ConfigError),

    #[error("building runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("http client: {0}")]
    Http(#[from] bifrost_common::http::HttpError),

    #[error("metrics: {0}")]
    Metrics(#[from] bifrost_common::metrics::MetricsError),

    #[error("thorchain: {0}")]
    Thorchain(#[from] bifrost_thorclient::ClientError),

    #[error("signing key: {0}")]
    Key(#[from] SignError),

    #[error("pool address: {0}")]
    Address(#[from] ParseError),

    #[error("configured pool address {configured} is not controlled by the signing key ({derived})")]
    PoolAddressMismatch { configured: Address, derived: Address },

    #[error("no signing key, no pool address and the chain reports no current pool")]
    NoPoolKey,
}
