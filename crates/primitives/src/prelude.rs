pub use crate::amount::Amount;
pub use crate::asset::{Asset, Symbol, Ticker};
pub use crate::chain::Chain;
pub use crate::coin::Coin;
pub use crate::errors::ParseError;
pub use crate::keys::{Address, Network, PubKey};
pub use crate::pool::PoolAddresses;
pub use crate::tx::{ObservedTx, Tx, TxIn, TxInItem, TxOut, TxOutItem};
pub use crate::txid::TxId;
