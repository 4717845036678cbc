use bifrost_common::http::HttpError;
use bifrost_db::errors::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("db: {0}")]
    Db(#[from] DbError),

    #[error("http: {0}")]
    Http(#[from] HttpError),

    #[error("malformed block height: {0}")]
    MalformedHeight(String),

    #[error("block handler: {0:#}")]
    Handler(anyhow::Error),
}

pub type ScannerResult<T> = Result<T, ScannerError>;

/// Outcome of a failed [`BlockHandler`](crate::BlockHandler) call.
#[derive(Debug, Error)]
pub enum BlockError {
    /// The height is marked failed and picked up again by the retry task.
    #[error("{0:#}")]
    Retry(anyhow::Error),

    /// Stops the worker, which brings the process down.
    #[error("fatal: {0:#}")]
    Fatal(anyhow::Error),
}

impl From<DbError> for BlockError {
    fn from(err: DbError) -> Self {
        Self::Fatal(err.into())
    }
}
