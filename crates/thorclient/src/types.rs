//! Wire shapes of the THORChain REST API.

use bifrost_primitives::serde_utils::{i64_string, u64_string};
use serde::{Deserialize, Serialize};

use crate::messages::ChainMsg;

/// Gas every bifrost tx declares, fees are waived for node accounts.
pub const DEFAULT_GAS: u64 = 100_000_000;

/// Type tag of a secp256k1 key in amino JSON.
pub const SECP256K1_PUBKEY_TYPE: &str = "tendermint/PubKeySecp256k1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdFee {
    pub amount: Vec<serde_json::Value>,
    #[serde(with = "u64_string")]
    pub gas: u64,
}

impl Default for StdFee {
    fn default() -> Self {
        Self {
            amount: Vec::new(),
            gas: DEFAULT_GAS,
        }
    }
}

/// The document the account key signs.
#[derive(Clone, Debug, Serialize)]
pub struct StdSignDoc<'a> {
    #[serde(with = "u64_string")]
    pub account_number: u64,
    pub chain_id: &'a str,
    pub fee: &'a StdFee,
    pub memo: &'a str,
    pub msgs: &'a [ChainMsg],
    #[serde(with = "u64_string")]
    pub sequence: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonPubKey {
    #[serde(rename = "type")]
    pub kind: String,
    /// Base64 of the compressed key.
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdSignature {
    pub pub_key: JsonPubKey,
    /// Base64 of the compact signature.
    pub signature: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct StdTx<'a> {
    pub msg: &'a [ChainMsg],
    pub fee: &'a StdFee,
    pub signatures: Vec<StdSignature>,
    pub memo: &'a str,
}

/// Broadcast mode of `POST /txs`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxMode {
    Sync,
    Async,
    Block,
}

#[derive(Clone, Debug, Serialize)]
pub struct PostTxRequest<'a> {
    pub tx: StdTx<'a>,
    pub mode: TxMode,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PostTxResponse {
    #[serde(default, with = "i64_string")]
    pub height: i64,
    pub txhash: String,
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub raw_log: String,
}

/// `GET /auth/accounts/{addr}`, with or without the `height`/`result` wrapper.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum AccountResponse {
    Wrapped { result: AccountEnvelope },
    Bare(AccountEnvelope),
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct AccountEnvelope {
    pub value: ChainAccount,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ChainAccount {
    #[serde(default, with = "u64_string")]
    pub account_number: u64,
    #[serde(default, with = "u64_string")]
    pub sequence: u64,
}

impl AccountResponse {
    pub(crate) fn into_account(self) -> ChainAccount {
        match self {
            Self::Wrapped { result } => result.value,
            Self::Bare(env) => env.value,
        }
    }
}

/// `GET /thorchain/lastblock/{chain}`.
#[derive(Clone, Debug, Deserialize)]
pub struct LastBlockHeights {
    #[serde(default)]
    pub chain: String,
    #[serde(rename = "lastobservedin", with = "i64_string")]
    pub last_observed_in: i64,
    #[serde(rename = "lastsignedout", default, with = "i64_string")]
    pub last_signed_out: i64,
    #[serde(default, with = "i64_string")]
    pub statechain: i64,
}

/// The part of `GET /thorchain/observer/{addr}` the whitelist check needs.
#[derive(Clone, Debug, Deserialize)]
pub struct NodeAccount {
    #[serde(default)]
    pub node_address: String,
    #[serde(default)]
    pub status: String,
}

impl NodeAccount {
    /// `unknown`, `disabled` and missing statuses may not submit anything.
    pub fn can_observe(&self) -> bool {
        !matches!(self.status.as_str(), "" | "unknown" | "disabled")
    }
}
