//! Public keys and the bech32 addresses derived from them.

use std::{fmt, str::FromStr};

use bech32::{Bech32, Hrp};
use bitcoin::hashes::{hash160, Hash};
use secp256k1::PublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ParseError;

/// Human readable prefix of THORChain account addresses.
pub const THOR_HRP: &str = "thor";

/// Binance Chain network flavour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Testnet,
    Mainnet,
}

impl Network {
    /// Address prefix on this network.
    pub fn hrp(&self) -> &'static str {
        match self {
            Self::Testnet => "tbnb",
            Self::Mainnet => "bnb",
        }
    }

    pub fn chain_id(&self) -> &'static str {
        match self {
            Self::Testnet => "Binance-Chain-Nile",
            Self::Mainnet => "Binance-Chain-Tigris",
        }
    }

    /// Guesses the network from the DEX host: the public testnet and local
    /// nodes are testnets, anything else is mainnet.
    pub fn from_dex_host(host: &str) -> Self {
        if host.contains("testnet-dex.binance.org") || host.contains("127.0.0.1") {
            Self::Testnet
        } else {
            Self::Mainnet
        }
    }
}

/// Compressed secp256k1 public key, hex encoded on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PubKey(PublicKey);

impl PubKey {
    pub fn new(pk: PublicKey) -> Self {
        Self(pk)
    }

    /// Accepts both compressed (33 bytes) and uncompressed (65 bytes) keys.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
        PublicKey::from_slice(bytes)
            .map(Self)
            .map_err(|e| ParseError::InvalidPubkey(e.to_string()))
    }

    pub fn from_hex(s: &str) -> Result<Self, ParseError> {
        let bytes = hex::decode(s.trim()).map_err(|e| ParseError::InvalidPubkey(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn inner(&self) -> &PublicKey {
        &self.0
    }

    pub fn to_bytes(&self) -> [u8; 33] {
        self.0.serialize()
    }

    /// `RIPEMD160(SHA256(compressed key))`, the account id.
    pub fn hash160(&self) -> [u8; 20] {
        hash160::Hash::hash(&self.to_bytes()).to_byte_array()
    }

    /// Derives the account address under the given prefix.
    pub fn address(&self, hrp: &str) -> Result<Address, ParseError> {
        Address::from_hash(hrp, &self.hash160())
    }
}

impl fmt::Display for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_bytes()))
    }
}

impl FromStr for PubKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for PubKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PubKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A bech32 account address, stored lowercase so that equality is
/// case-insensitive.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(String);

impl Address {
    pub fn new(s: &str) -> Result<Self, ParseError> {
        let normalised = s.trim().to_ascii_lowercase();
        bech32::decode(&normalised)
            .map_err(|e| ParseError::InvalidAddress(s.to_owned(), e.to_string()))?;
        Ok(Self(normalised))
    }

    pub fn from_hash(hrp: &str, hash: &[u8]) -> Result<Self, ParseError> {
        let parsed =
            Hrp::parse(hrp).map_err(|e| ParseError::InvalidAddress(hrp.to_owned(), e.to_string()))?;
        bech32::encode::<Bech32>(parsed, hash)
            .map(Self)
            .map_err(|e| ParseError::InvalidAddress(hrp.to_owned(), e.to_string()))
    }

    /// The 20-byte account id the address encodes.
    pub fn hash(&self) -> Result<Vec<u8>, ParseError> {
        bech32::decode(&self.0)
            .map(|(_, data)| data)
            .map_err(|e| ParseError::InvalidAddress(self.0.clone(), e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use secp256k1::{SecretKey, SECP256K1};

    use super::*;

    const POOL: &str = "tbnb1ggdcyhk8rc7fgzp8wa2su220aclcggcsd94ye5";

    #[test]
    fn test_address_is_case_insensitive() {
        let lower = Address::new(POOL).unwrap();
        let upper = Address::new(&POOL.to_ascii_uppercase()).unwrap();
        assert_eq!(lower, upper);
        assert_eq!(upper.as_str(), POOL);
    }

    #[test]
    fn test_address_rejects_bad_checksum() {
        assert!(Address::new("tbnb1ggdcyhk8rc7fgzp8wa2su220aclcggcsd94yex").is_err());
        assert!(Address::new("not-an-address").is_err());
    }

    #[test]
    fn test_address_hash_roundtrip() {
        let addr = Address::new(POOL).unwrap();
        let hash = addr.hash().unwrap();
        assert_eq!(hash.len(), 20);
        assert_eq!(Address::from_hash("tbnb", &hash).unwrap(), addr);
    }

    #[test]
    fn test_pubkey_derives_address() {
        let sk = SecretKey::from_slice(&[7u8; 32]).unwrap();
        let pk = PubKey::new(sk.public_key(SECP256K1));

        let tbnb = pk.address(Network::Testnet.hrp()).unwrap();
        let bnb = pk.address(Network::Mainnet.hrp()).unwrap();
        assert!(tbnb.as_str().starts_with("tbnb1"));
        assert!(bnb.as_str().starts_with("bnb1"));
        assert_eq!(tbnb.hash().unwrap(), bnb.hash().unwrap());
    }

    #[test]
    fn test_pubkey_hex_serde() {
        let sk = SecretKey::from_slice(&[9u8; 32]).unwrap();
        let pk = PubKey::new(sk.public_key(SECP256K1));
        let json = serde_json::to_string(&pk).unwrap();
        assert_eq!(json.len(), 66 + 2);
        let back: PubKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pk);
    }

    #[test]
    fn test_network_from_dex_host() {
        assert_eq!(
            Network::from_dex_host("testnet-dex.binance.org"),
            Network::Testnet
        );
        assert_eq!(Network::from_dex_host("127.0.0.1:8080"), Network::Testnet);
        assert_eq!(Network::from_dex_host("dex.binance.org"), Network::Mainnet);
    }
}
