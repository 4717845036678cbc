//! Narrow views of the node RPC and DEX REST replies, only the fields we read.

use bifrost_primitives::serde_utils::i64_string;
use serde::{Deserialize, Serialize};

/// `GET /tx_search` reply.
#[derive(Debug, Clone, Deserialize)]
pub struct TxSearchResponse {
    pub result: TxSearchResult,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxSearchResult {
    #[serde(default)]
    pub txs: Vec<TxSearchItem>,
    #[serde(with = "i64_string")]
    pub total_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxSearchItem {
    pub hash: String,
}

/// `GET /api/v1/tx/{hash}?format=json` reply.
#[derive(Debug, Clone, Deserialize)]
pub struct DexTx {
    #[serde(default)]
    pub hash: String,
    #[serde(with = "i64_string")]
    pub height: i64,
    pub tx: DexStdTx,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexStdTx {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub value: DexStdTxValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexStdTxValue {
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub msg: Vec<DexMsg>,
}

/// Type tag of a transfer message.
pub const SEND_MSG_TYPE: &str = "cosmos-sdk/Send";

#[derive(Debug, Clone, Deserialize)]
pub struct DexMsg {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: DexMsgValue,
}

impl DexMsg {
    pub fn is_send(&self) -> bool {
        self.kind == SEND_MSG_TYPE
    }
}

/// Only transfers carry inputs and outputs, other messages decode empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexMsgValue {
    #[serde(default)]
    pub inputs: Vec<DexInOut>,
    #[serde(default)]
    pub outputs: Vec<DexInOut>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexInOut {
    pub address: String,
    #[serde(default)]
    pub coins: Vec<DexCoin>,
}

/// Amounts stay raw, the caller decides how a bad one fails.
#[derive(Debug, Clone, Deserialize)]
pub struct DexCoin {
    pub denom: String,
    #[serde(deserialize_with = "raw_amount")]
    pub amount: String,
}

fn raw_amount<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "amount must be a string or number, got {other}"
        ))),
    }
}

/// `GET /api/v1/account/{addr}` reply. Depending on the node the fields sit
/// at the top level or under `value`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AccountResponse {
    #[serde(default, with = "opt_i64")]
    pub account_number: Option<i64>,
    #[serde(default, with = "opt_i64")]
    pub sequence: Option<i64>,
    #[serde(default)]
    pub value: Option<AccountValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AccountValue {
    #[serde(default, with = "opt_i64")]
    pub account_number: Option<i64>,
    #[serde(default, with = "opt_i64")]
    pub sequence: Option<i64>,
}

impl AccountResponse {
    pub(crate) fn into_account(self) -> Option<Account> {
        let nested = self.value.as_ref();
        let account_number = self
            .account_number
            .or_else(|| nested.and_then(|v| v.account_number))?;
        let sequence = self.sequence.or_else(|| nested.and_then(|v| v.sequence))?;
        Some(Account {
            account_number,
            sequence,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_number: i64,
    pub sequence: i64,
}

/// One entry of the `POST /api/v1/broadcast` reply array.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BroadcastEntry {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub hash: String,
}

mod opt_i64 {
    use serde::{Deserialize, Deserializer};

    use super::i64_string;

    #[derive(Deserialize)]
    struct Wrapped(#[serde(with = "i64_string")] i64);

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|w| w.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_top_level_numbers() {
        let resp: AccountResponse = serde_json::from_str(
            r#"{"account_number":29,"address":"tbnb1...","balances":[],"sequence":3}"#,
        )
        .unwrap();
        assert_eq!(
            resp.into_account(),
            Some(Account {
                account_number: 29,
                sequence: 3
            })
        );
    }

    #[test]
    fn test_account_nested_strings() {
        let resp: AccountResponse = serde_json::from_str(
            r#"{"type":"bnbchain/Account","value":{"account_number":"29","sequence":"12"}}"#,
        )
        .unwrap();
        assert_eq!(
            resp.into_account(),
            Some(Account {
                account_number: 29,
                sequence: 12
            })
        );
    }

    #[test]
    fn test_account_missing_fields() {
        let resp: AccountResponse = serde_json::from_str(r#"{"address":"x"}"#).unwrap();
        assert_eq!(resp.into_account(), None);
    }

    #[test]
    fn test_decode_dex_tx_with_other_messages() {
        let tx: DexTx = serde_json::from_str(
            r#"{
                "hash": "10C4E872A5DC842BE72AC8DE9C6A13F97DF6D345336F01B87EBA998F5A3BC36D",
                "height": "35345060",
                "tx": {"type": "auth/StdTx", "value": {
                    "memo": "",
                    "msg": [{"type": "dex/NewOrder", "value": {"id": "x", "price": 1}}]
                }}
            }"#,
        )
        .unwrap();
        assert_eq!(tx.height, 35_345_060);
        assert!(!tx.tx.value.msg[0].is_send());
        assert!(tx.tx.value.msg[0].value.outputs.is_empty());
    }
}
