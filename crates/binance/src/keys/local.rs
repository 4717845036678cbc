use async_trait::async_trait;
use bifrost_primitives::keys::PubKey;
use secp256k1::{Message, SecretKey, SECP256K1};
use sha2::{Digest, Sha256};

use super::{KeyManager, SignError, SignResult, Signed};

/// Holds the private key in memory.
pub struct LocalKeyManager {
    secret: SecretKey,
    pub_key: PubKey,
}

impl LocalKeyManager {
    pub fn new(secret: SecretKey) -> Self {
        let pub_key = PubKey::new(secret.public_key(SECP256K1));
        Self { secret, pub_key }
    }

    pub fn from_hex(private_key: &str) -> SignResult<Self> {
        let bytes = hex::decode(private_key.trim().trim_start_matches("0x"))
            .map_err(|e| SignError::InvalidKey(e.to_string()))?;
        let secret =
            SecretKey::from_slice(&bytes).map_err(|e| SignError::InvalidKey(e.to_string()))?;
        Ok(Self::new(secret))
    }
}

impl std::fmt::Debug for LocalKeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeyManager")
            .field("pub_key", &self.pub_key)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyManager for LocalKeyManager {
    fn pub_key(&self) -> Option<PubKey> {
        Some(self.pub_key)
    }

    async fn sign(&self, sign_bytes: &[u8]) -> SignResult<Signed> {
        let digest: [u8; 32] = Sha256::digest(sign_bytes).into();
        let sig = SECP256K1.sign_ecdsa(&Message::from_digest(digest), &self.secret);
        Ok(Signed {
            pub_key: self.pub_key,
            signature: sig.serialize_compact(),
        })
    }
}

#[cfg(test)]
mod tests {
    use secp256k1::ecdsa::Signature;

    use super::*;

    #[tokio::test]
    async fn test_local_signature_verifies() {
        let km = LocalKeyManager::from_hex(&hex::encode([5u8; 32])).unwrap();
        let signed = km.sign(b"payload").await.unwrap();

        let digest: [u8; 32] = Sha256::digest(b"payload").into();
        let sig = Signature::from_compact(&signed.signature).unwrap();
        assert!(SECP256K1
            .verify_ecdsa(&Message::from_digest(digest), &sig, signed.pub_key.inner())
            .is_ok());
        assert_eq!(Some(signed.pub_key), km.pub_key());
    }

    #[test]
    fn test_rejects_bad_key() {
        assert!(LocalKeyManager::from_hex("zz").is_err());
        assert!(LocalKeyManager::from_hex(&hex::encode([0u8; 32])).is_err());
    }

    #[test]
    fn test_debug_hides_secret() {
        let km = LocalKeyManager::from_hex(&hex::encode([5u8; 32])).unwrap();
        let dbg = format!("{km:?}");
        assert!(!dbg.contains(&hex::encode([5u8; 32])));
    }
}
