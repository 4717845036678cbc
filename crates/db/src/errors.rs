use rockbound::CodecError;
use thiserror::Error;

/// Simple result type used across database interface.
pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("scan position can't go backwards from {current} to {requested}")]
    ScanPosRegression { current: i64, requested: i64 },

    #[error("rocksdb: {0}")]
    Rocksdb(String),

    #[error("codec: {0}")]
    Codec(String),

    #[error("transaction: {0}")]
    TransactionError(String),

    #[error("worker pool dropped `{0}` before it replied")]
    WorkerDropped(&'static str),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for DbError {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(value.to_string())
    }
}

impl From<CodecError> for DbError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value.to_string())
    }
}
