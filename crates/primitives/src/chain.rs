use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ParseError;

/// Identifier of a chain the network interacts with, e.g. `BNB` or `THOR`.
///
/// Always 3 to 10 uppercase ASCII letters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Chain(String);

impl Chain {
    pub const MIN_LEN: usize = 3;
    pub const MAX_LEN: usize = 10;

    pub fn new(id: &str) -> Result<Self, ParseError> {
        let id = id.trim().to_ascii_uppercase();
        if id.len() < Self::MIN_LEN {
            return Err(ParseError::InvalidChain(id, "shorter than 3 characters"));
        }
        if id.len() > Self::MAX_LEN {
            return Err(ParseError::InvalidChain(id, "longer than 10 characters"));
        }
        if !id.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(ParseError::InvalidChain(id, "only letters are allowed"));
        }
        Ok(Self(id))
    }

    /// Binance Chain.
    pub fn bnb() -> Self {
        Self("BNB".to_owned())
    }

    /// The THORChain itself.
    pub fn thor() -> Self {
        Self("THOR".to_owned())
    }

    pub fn is_bnb(&self) -> bool {
        self.0 == "BNB"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Chain {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for Chain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Chain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_is_normalised_to_uppercase() {
        assert_eq!(Chain::new("bnb").unwrap(), Chain::bnb());
        assert!(Chain::bnb().is_bnb());
        assert!(!Chain::thor().is_bnb());
    }

    #[test]
    fn test_chain_rejects_bad_ids() {
        assert!(Chain::new("BN").is_err());
        assert!(Chain::new("ABCDEFGHIJK").is_err());
        assert!(Chain::new("BNB1").is_err());
        assert!(Chain::new("B-B").is_err());
    }
}
