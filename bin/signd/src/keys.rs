//! The signing backend picked at startup.

use async_trait::async_trait;
use bifrost_binance::keys::{KeyManager, LocalKeyManager, SignResult, Signed, TssKeyManager};
use bifrost_primitives::keys::PubKey;

#[derive(Debug)]
pub(crate) enum SignerKeys {
    Local(LocalKeyManager),
    Tss(TssKeyManager),
}

impl SignerKeys {
    /// Pins the key TSS signatures must come from. No-op for a local key.
    pub(crate) fn with_expected_key(self, pub_key: Option<PubKey>) -> Self {
        match (self, pub_key) {
            (Self::Tss(tss), Some(pk)) => Self::Tss(tss.with_expected_key(pk)),
            (keys, _) => keys,
        }
    }
}

#[async_trait]
impl KeyManager for SignerKeys {
    fn pub_key(&self) -> Option<PubKey> {
        match self {
            Self::Local(local) => local.pub_key(),
            Self::Tss(tss) => tss.pub_key(),
        }
    }

    async fn sign(&self, sign_bytes: &[u8]) -> SignResult<Signed> {
        match self {
            Self::Local(local) => local.sign(sign_bytes).await,
            Self::Tss(tss) => tss.sign(sign_bytes).await,
        }
    }
}
