use serde::{Deserialize, Serialize};

use crate::{
    keys::PubKey,
    serde_utils::{empty_as_none, i64_string},
};

/// The three pool keys the network currently custodies funds with.
///
/// The default value has no keys at all and therefore matches no address.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAddresses {
    #[serde(default, with = "empty_as_none")]
    pub previous: Option<PubKey>,
    #[serde(default, with = "empty_as_none")]
    pub current: Option<PubKey>,
    #[serde(default, with = "empty_as_none")]
    pub next: Option<PubKey>,
    #[serde(default, with = "i64_string")]
    pub rotate_at: i64,
}

impl PoolAddresses {
    pub fn is_empty(&self) -> bool {
        self.previous.is_none() && self.current.is_none() && self.next.is_none()
    }
}

#[cfg(test)]
mod tests {
    use secp256k1::{SecretKey, SECP256K1};

    use super::*;

    #[test]
    fn test_decode_with_blanks() {
        let sk = SecretKey::from_slice(&[3u8; 32]).unwrap();
        let pk = PubKey::new(sk.public_key(SECP256K1));
        let json = format!(r#"{{"previous":"","current":"{pk}","next":"","rotate_at":"100"}}"#);

        let pool: PoolAddresses = serde_json::from_str(&json).unwrap();

        assert_eq!(pool.current, Some(pk));
        assert!(pool.previous.is_none());
        assert!(pool.next.is_none());
        assert_eq!(pool.rotate_at, 100);
        assert!(!pool.is_empty());
        assert!(PoolAddresses::default().is_empty());
    }
}
