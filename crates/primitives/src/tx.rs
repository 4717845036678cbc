//! Inbound observation batches and outbound instruction batches.

use serde::{Deserialize, Serialize};

use crate::{
    chain::Chain,
    coin::Coin,
    keys::{Address, PubKey},
    serde_utils::{empty_as_none, i64_string},
    txid::TxId,
};

/// One external transaction output that landed on a pool address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInItem {
    pub tx: TxId,
    pub sender: Address,
    pub to: Address,
    pub coins: Vec<Coin>,
    pub memo: String,
    pub observed_pool_key: PubKey,
}

/// Every observation extracted from one external block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub block_height: i64,
    pub count: usize,
    pub chain: Chain,
    pub tx_array: Vec<TxInItem>,
}

impl TxIn {
    pub fn new(block_height: i64, chain: Chain, tx_array: Vec<TxInItem>) -> Self {
        Self {
            block_height,
            count: tx_array.len(),
            chain,
            tx_array,
        }
    }

    /// Converts the batch into the votes submitted to the chain, keeping the
    /// remote's tx-index order.
    pub fn to_observed_txs(&self) -> Vec<ObservedTx> {
        self.tx_array
            .iter()
            .map(|item| ObservedTx {
                tx: Tx {
                    id: item.tx.clone(),
                    chain: self.chain.clone(),
                    from_address: item.sender.clone(),
                    to_address: item.to.clone(),
                    coins: item.coins.clone(),
                    memo: item.memo.clone(),
                },
                block_height: self.block_height,
                observed_pub_key: item.observed_pool_key,
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub id: TxId,
    pub chain: Chain,
    pub from_address: Address,
    pub to_address: Address,
    pub coins: Vec<Coin>,
    pub memo: String,
}

/// A single observation vote as carried inside `thorchain/ObservedTxIn`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedTx {
    pub tx: Tx,
    #[serde(with = "i64_string")]
    pub block_height: i64,
    pub observed_pub_key: PubKey,
}

/// One instruction of a chain block's outbound array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutItem {
    #[serde(default, with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub chain: Option<Chain>,
    pub to: Address,
    #[serde(default, with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub pool_address: Option<Address>,
    #[serde(default)]
    pub coins: Vec<Coin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Outbound array produced by one chain block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    #[serde(with = "i64_string")]
    pub height: i64,
    #[serde(default)]
    pub hash: String,
    #[serde(default, with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub chain: Option<Chain>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tx_array: Vec<TxOutItem>,
}

impl TxOut {
    pub fn is_empty(&self) -> bool {
        self.tx_array.is_empty()
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
