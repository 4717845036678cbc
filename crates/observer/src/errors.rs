use bifrost_db::DbError;
use bifrost_primitives::errors::ParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("binance: {0}")]
    Binance(#[from] bifrost_binance::ClientError),

    #[error("thorchain: {0}")]
    Thorchain(#[from] bifrost_thorclient::ClientError),

    /// A tx at a pool address carried data we cannot represent.
    #[error("tx {hash}: {source}")]
    InvalidTx { hash: String, source: ParseError },

    #[error("db: {0}")]
    Db(#[from] DbError),

    #[error("observation queue closed")]
    QueueClosed,

    #[error("pool addresses not loaded yet")]
    PoolsNotLoaded,
}

pub type ObserverResult<T> = Result<T, ObserverError>;
