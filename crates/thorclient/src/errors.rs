use std::{io, path::PathBuf};

use bifrost_common::http::HttpError;
use bifrost_primitives::errors::ParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http: {0}")]
    Http(#[from] HttpError),

    #[error("invalid remote data: {0}")]
    Parse(#[from] ParseError),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("encoding tx: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("reading key file {0}: {1}")]
    KeyFile(PathBuf, io::Error),

    #[error("invalid signer key: {0}")]
    InvalidKey(String),

    /// The chain refused the transaction.
    #[error("tx rejected (code {code}): {raw_log}")]
    Rejected { code: u32, raw_log: String },

    #[error("nothing to submit")]
    Empty,

    #[error("node {0} is not whitelisted: status {1:?}")]
    NotWhitelisted(String, String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Whether resubmitting with a freshly fetched account sequence may help.
    pub fn is_sequence_mismatch(&self) -> bool {
        let msg = match self {
            Self::Rejected { raw_log, .. } => raw_log.as_str(),
            Self::Http(HttpError::Status(code, body)) if (400..500).contains(code) => body.as_str(),
            _ => return false,
        };
        msg.to_ascii_lowercase().contains("sequence")
    }
}
