//! Signing backends for outbound transfers.

mod local;
mod tss;

use async_trait::async_trait;
use bifrost_common::http::HttpError;
use bifrost_primitives::keys::PubKey;
use thiserror::Error;

pub use local::LocalKeyManager;
pub use tss::TssKeyManager;

/// Marker the TSS party returns when the signing round failed for good.
pub const BROKEN_SIGNATURE: &str = "BROKEN SIGNATURE";

#[derive(Debug, Error)]
pub enum TssError {
    #[error("http: {0}")]
    Http(#[from] HttpError),

    #[error("TSS party reported {BROKEN_SIGNATURE}")]
    BrokenSignature,

    #[error("malformed TSS reply: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum SignError {
    #[error("tss: {0}")]
    Tss(#[from] TssError),

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("signed with {got}, expected {expected}")]
    KeyMismatch { expected: PubKey, got: PubKey },
}

pub type SignResult<T> = Result<T, SignError>;

impl SignError {
    /// Failures that repeating the same request cannot fix.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Tss(TssError::BrokenSignature)
                | Self::InvalidKey(_)
                | Self::InvalidSignature(_)
                | Self::KeyMismatch { .. }
        )
    }
}

/// A compact `R || S` signature with low `S`, and the key that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signed {
    pub pub_key: PubKey,
    pub signature: [u8; 64],
}

#[async_trait]
pub trait KeyManager: Sync + Send + 'static {
    /// The signing key when it is known ahead of signing.
    fn pub_key(&self) -> Option<PubKey>;

    /// Signs `sha256(sign_bytes)`.
    async fn sign(&self, sign_bytes: &[u8]) -> SignResult<Signed>;
}
