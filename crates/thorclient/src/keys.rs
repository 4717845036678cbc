//! The node's own THORChain account key.

use std::{fmt, fs, path::Path};

use bifrost_primitives::keys::{Address, PubKey, THOR_HRP};
use secp256k1::{Message, SecretKey, SECP256K1};
use sha2::{Digest, Sha256};
use tracing::*;

use crate::errors::{ClientError, ClientResult};

/// Signing key of the observer/signer account on THORChain.
pub struct ChainKeys {
    secret: SecretKey,
    pub_key: PubKey,
    address: Address,
}

impl ChainKeys {
    pub fn new(secret: SecretKey) -> ClientResult<Self> {
        let pub_key = PubKey::new(secret.public_key(SECP256K1));
        let address = pub_key.address(THOR_HRP)?;
        Ok(Self {
            secret,
            pub_key,
            address,
        })
    }

    pub fn from_hex(s: &str) -> ClientResult<Self> {
        let bytes =
            hex::decode(s.trim()).map_err(|e| ClientError::InvalidKey(format!("not hex: {e}")))?;
        let secret =
            SecretKey::from_slice(&bytes).map_err(|e| ClientError::InvalidKey(e.to_string()))?;
        Self::new(secret)
    }

    /// Loads the hex encoded key stored at `path`.
    pub fn load(path: &Path) -> ClientResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| ClientError::KeyFile(path.to_owned(), e))?;
        let keys = Self::from_hex(&raw)?;
        info!(path = %path.display(), address = %keys.address, "loaded signer key");
        Ok(keys)
    }

    pub fn pub_key(&self) -> PubKey {
        self.pub_key
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Compact signature over `sha256(bytes)`.
    pub fn sign(&self, bytes: &[u8]) -> [u8; 64] {
        let digest: [u8; 32] = Sha256::digest(bytes).into();
        SECP256K1
            .sign_ecdsa(&Message::from_digest(digest), &self.secret)
            .serialize_compact()
    }
}

impl fmt::Debug for ChainKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainKeys")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_load_key_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", hex::encode([4u8; 32])).unwrap();

        let keys = ChainKeys::load(file.path()).unwrap();
        assert!(keys.address().as_str().starts_with("thor1"));
    }

    #[test]
    fn test_missing_key_file() {
        let res = ChainKeys::load(Path::new("/nonexistent/thorchain.key"));
        assert!(matches!(res, Err(ClientError::KeyFile(..))));
    }

    #[test]
    fn test_invalid_key() {
        assert!(matches!(
            ChainKeys::from_hex("not a key"),
            Err(ClientError::InvalidKey(_))
        ));
    }
}
