use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{amount::Amount, asset::Asset};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub asset: Asset,
    pub amount: Amount,
}

impl Coin {
    pub fn new(asset: Asset, amount: Amount) -> Self {
        Self { asset, amount }
    }

    pub fn is_empty(&self) -> bool {
        self.amount.is_zero()
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.asset)
    }
}
