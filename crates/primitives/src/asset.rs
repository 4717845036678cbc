use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{chain::Chain, errors::ParseError};

/// Short asset name, e.g. `RUNE` for `RUNE-A1F`. 3 to 8 characters, uppercase.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ticker(String);

impl Ticker {
    pub fn new(s: &str) -> Result<Self, ParseError> {
        if s.len() < 3 {
            return Err(ParseError::InvalidTicker(s.to_owned(), "not enough characters"));
        }
        if s.len() > 8 {
            return Err(ParseError::InvalidTicker(s.to_owned(), "too many characters"));
        }
        if !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(ParseError::InvalidTicker(s.to_owned(), "not alphanumeric"));
        }
        Ok(Self(s.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full on-chain denom, e.g. `RUNE-A1F`. The part before `-` is the ticker.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Symbol(String);

impl Symbol {
    const MAX_LEN: usize = 20;

    pub fn new(s: &str) -> Result<Self, ParseError> {
        let valid = !s.is_empty()
            && s.len() <= Self::MAX_LEN
            && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-');
        if !valid {
            return Err(ParseError::InvalidSymbol(s.to_owned()));
        }
        Ok(Self(s.to_ascii_uppercase()))
    }

    /// The ticker part of the symbol.
    pub fn ticker(&self) -> Result<Ticker, ParseError> {
        let base = self.0.split('-').next().unwrap_or_default();
        Ticker::new(base)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An asset on a given chain, written `CHAIN.SYMBOL` (e.g. `BNB.RUNE-A1F`).
///
/// A bare symbol is taken to live on the THORChain.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Asset {
    pub chain: Chain,
    pub symbol: Symbol,
    pub ticker: Ticker,
}

impl Asset {
    pub fn new(input: &str) -> Result<Self, ParseError> {
        let (chain, sym) = match input.split_once('.') {
            Some((chain, sym)) => (Chain::new(chain)?, sym),
            None => (Chain::thor(), input),
        };
        Self::on_chain(chain, sym)
    }

    /// Builds an asset from a chain-native denom, as found in tx coins.
    pub fn on_chain(chain: Chain, denom: &str) -> Result<Self, ParseError> {
        let symbol = Symbol::new(denom)?;
        let ticker = symbol.ticker()?;
        Ok(Self {
            chain,
            symbol,
            ticker,
        })
    }

    /// The native BNB coin.
    pub fn bnb() -> Self {
        Self {
            chain: Chain::bnb(),
            symbol: Symbol("BNB".to_owned()),
            ticker: Ticker("BNB".to_owned()),
        }
    }

    /// Whether this is any representation of RUNE: the native one or a
    /// BEP2 token whose ticker is `RUNE`.
    pub fn is_rune(&self) -> bool {
        self.ticker.as_str() == "RUNE"
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.chain, self.symbol)
    }
}

impl FromStr for Asset {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for Asset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Asset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}
