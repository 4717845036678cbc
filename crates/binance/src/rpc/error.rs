//! Error types for the Binance Chain client.

use bifrost_common::http::HttpError;
use bifrost_primitives::errors::ParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http: {0}")]
    Http(#[from] HttpError),

    /// Remote data that does not hold a valid primitive.
    #[error("invalid remote data: {0}")]
    Parse(#[from] ParseError),

    /// A response that decoded but misses something we need.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The node refused the transaction.
    #[error("tx rejected (code {code}): {log}")]
    Rejected { code: i64, log: String },
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Whether the node rejected the tx because of a stale account sequence.
    ///
    /// The DEX reports this either as a non-ok broadcast entry or as a 4xx
    /// whose body carries the message.
    pub fn is_sequence_mismatch(&self) -> bool {
        let msg = match self {
            Self::Rejected { log, .. } => log.as_str(),
            Self::Http(HttpError::Status(code, body)) if (400..500).contains(code) => body.as_str(),
            _ => return false,
        };
        msg.to_ascii_lowercase().contains("sequence")
    }

    /// Whether the DEX answered that it does not know the requested entity.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Http(HttpError::Status(404, _)) => true,
            Self::Http(HttpError::Status(code, body)) if (400..500).contains(code) => {
                body.to_ascii_lowercase().contains("not found")
            }
            _ => false,
        }
    }

    /// Whether the node answered and refused the tx, so it never reached
    /// the mempool.
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::Rejected { .. } => true,
            Self::Http(HttpError::Status(code, _)) => (400..500).contains(code),
            _ => false,
        }
    }
}
