use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ParseError;

/// Transaction hash, 64 hex characters, normalised to uppercase.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId(String);

impl TxId {
    pub const LEN: usize = 64;

    pub fn new(hash: &str) -> Result<Self, ParseError> {
        if hash.len() != Self::LEN {
            return Err(ParseError::InvalidTxId(
                hash.to_owned(),
                "must be 64 characters",
            ));
        }
        if !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseError::InvalidTxId(hash.to_owned(), "not hex"));
        }
        Ok(Self(hash.to_ascii_uppercase()))
    }

    /// Hex-encodes a 32-byte digest.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(hex::encode_upper(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TxId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for TxId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}
