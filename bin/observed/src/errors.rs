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
}
