use bifrost_binance::keys::SignError;
use bifrost_db::DbError;
use bifrost_primitives::{errors::ParseError, keys::Address};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("binance: {0}")]
    Binance(#[from] bifrost_binance::ClientError),

    #[error("thorchain: {0}")]
    Thorchain(#[from] bifrost_thorclient::ClientError),

    #[error("signing: {0}")]
    Sign(#[from] SignError),

    #[error("encoding tx: {0}")]
    Encode(#[from] ParseError),

    #[error("building sign doc: {0}")]
    SignDoc(#[from] serde_json::Error),

    #[error("amount of {0} does not fit a binance coin")]
    AmountOverflow(String),

    #[error("signature made by {got}, expected {expected}")]
    SignerMismatch { expected: Address, got: Address },

    #[error("still a sequence mismatch after {0} retries")]
    BroadcastRetriesExhausted(u32),

    #[error("outbound of height {0} holds a signed tx not resolved yet")]
    UnresolvedTx(i64),

    #[error("db: {0}")]
    Db(#[from] DbError),

    #[error("outbound queue closed")]
    QueueClosed,
}

pub type SignerResult<T> = Result<T, SignerError>;

impl SignerError {
    /// Failures that would repeat for the same batch no matter how often it
    /// is retried.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Sign(err) => err.is_permanent(),
            Self::Encode(_) | Self::SignDoc(_) | Self::AmountOverflow(_) | Self::SignerMismatch { .. } => true,
            _ => false,
        }
    }

    /// Short label for the error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Binance(_) => "binance",
            Self::Thorchain(_) => "thorchain",
            Self::Sign(_) => "sign",
            Self::Encode(_) | Self::SignDoc(_) => "encode",
            Self::AmountOverflow(_) => "amount_overflow",
            Self::SignerMismatch { .. } => "signer_mismatch",
            Self::BroadcastRetriesExhausted(_) => "broadcast_retries_exhausted",
            Self::UnresolvedTx(_) => "unresolved_tx",
            Self::Db(_) => "db",
            Self::QueueClosed => "queue_closed",
        }
    }
}
