use std::{fmt, iter::Sum, str::FromStr};

use ethnum::U256;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ParseError;

/// Number of decimals of the fixed-point convention used on the wire.
pub const DECIMALS: usize = 8;

/// Unsigned amount in base units (1e-8 of a display unit).
///
/// Serialized as a decimal string. Deserialization also accepts JSON
/// integers and display strings carrying up to 8 decimals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(U256);

impl Amount {
    pub const ZERO: Self = Self(U256::ZERO);

    pub fn new(v: U256) -> Self {
        Self(v)
    }

    pub fn from_u64(v: u64) -> Self {
        Self(U256::from(v))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == U256::ZERO
    }

    pub fn inner(&self) -> U256 {
        self.0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Narrows to `i64`, as used by the Binance wire format.
    pub fn to_i64(&self) -> Option<i64> {
        let (hi, lo) = self.0.into_words();
        if hi == 0 && lo <= i64::MAX as u128 {
            Some(lo as i64)
        } else {
            None
        }
    }

    /// Parses either an integer amount in base units (`"100000000"`) or a
    /// display amount (`"1.00000000"`), which is multiplied out by 10^8.
    pub fn from_decimal_str(s: &str) -> Result<Self, ParseError> {
        let s = s.trim();
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (s, None),
        };

        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidAmount(s.to_owned()));
        }
        let int = parse_digits(int_part, s)?;

        let Some(frac) = frac_part else {
            return Ok(Self(int));
        };

        if frac.len() > DECIMALS || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidAmount(s.to_owned()));
        }
        let frac_padded = format!("{frac:0<width$}", width = DECIMALS);
        let frac = parse_digits(&frac_padded, s)?;

        let scale = U256::from(10u64.pow(DECIMALS as u32));
        int.checked_mul(scale)
            .and_then(|v| v.checked_add(frac))
            .map(Self)
            .ok_or_else(|| ParseError::AmountOverflow(s.to_owned()))
    }
}

fn parse_digits(digits: &str, orig: &str) -> Result<U256, ParseError> {
    U256::from_str_radix(digits, 10).map_err(|_| ParseError::AmountOverflow(orig.to_owned()))
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_decimal_str(s)
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Self::from_u64(v)
    }
}

impl Sum for Amount {
    /// Saturates instead of overflowing; real balances are far below 2^256.
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| Self(acc.0.saturating_add(x.0)))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl<'de> de::Visitor<'de> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative decimal amount")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount::from_u64(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                u64::try_from(v)
                    .map(Amount::from_u64)
                    .map_err(|_| E::custom(ParseError::InvalidAmount(v.to_string())))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                Amount::from_decimal_str(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_units() {
        assert_eq!(
            Amount::from_decimal_str("100000000").unwrap(),
            Amount::from_u64(100_000_000)
        );
    }

    #[test]
    fn test_parse_display_units() {
        assert_eq!(
            Amount::from_decimal_str("1.94765912").unwrap(),
            Amount::from_u64(194_765_912)
        );
        assert_eq!(
            Amount::from_decimal_str("0.5").unwrap(),
            Amount::from_u64(50_000_000)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["eeee", "", "-1", "1.123456789", "1.2.3", ".5", "1e8"] {
            assert!(
                Amount::from_decimal_str(bad).is_err(),
                "should reject {bad:?}"
            );
        }
    }

    #[test]
    fn test_large_amount_roundtrips_as_string() {
        let big = "340282366920938463463374607431768211456"; // 2^128
        let amount: Amount = serde_json::from_str(&format!("\"{big}\"")).unwrap();
        assert_eq!(serde_json::to_string(&amount).unwrap(), format!("\"{big}\""));
        assert_eq!(amount.to_i64(), None);
    }

    #[test]
    fn test_deserialize_number() {
        let amount: Amount = serde_json::from_str("194765912").unwrap();
        assert_eq!(amount.to_i64(), Some(194_765_912));
    }
}
