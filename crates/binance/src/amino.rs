//! Amino encoding of a signed Binance Chain transfer.
//!
//! Only the shapes the signer produces are covered: an `auth/StdTx` carrying
//! `cosmos-sdk/Send` messages and a secp256k1 signature. Fields holding their
//! default value are omitted, as amino does.

use std::collections::BTreeMap;

use bifrost_primitives::{canonical_json, errors::ParseError, keys::Address, keys::PubKey, txid::TxId};
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};

/// Registered prefix of `auth/StdTx`.
const STD_TX_PREFIX: [u8; 4] = [0xF0, 0x62, 0x5D, 0xEE];

/// Registered prefix of `cosmos-sdk/Send`.
const SEND_MSG_PREFIX: [u8; 4] = [0x2A, 0x2C, 0x87, 0xFA];

/// Registered prefix of `tendermint/PubKeySecp256k1`.
const PUBKEY_PREFIX: [u8; 4] = [0xEB, 0x5A, 0xE9, 0x87];

const WIRE_VARINT: u8 = 0;
const WIRE_BYTES: u8 = 2;

/// Source id stamped on every tx we produce.
pub const DEFAULT_SOURCE: i64 = 0;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Token {
    pub amount: i64,
    pub denom: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InOut {
    pub address: Address,
    pub coins: Vec<Token>,
}

impl InOut {
    /// Coins are sorted by denom, as the chain requires.
    pub fn new(address: Address, mut coins: Vec<Token>) -> Self {
        coins.sort_by(|a, b| a.denom.cmp(&b.denom));
        Self { address, coins }
    }

    fn sign_json(&self) -> serde_json::Value {
        json!({
            "address": self.address.as_str(),
            "coins": self.coins,
        })
    }

    fn encode(&self) -> Result<Vec<u8>, ParseError> {
        let mut buf = Vec::new();
        put_bytes_field(&mut buf, 1, &self.address.hash()?);
        for coin in &self.coins {
            let mut token = Vec::new();
            put_bytes_field(&mut token, 1, coin.denom.as_bytes());
            put_uvarint_field(&mut token, 2, coin.amount);
            put_bytes_field(&mut buf, 2, &token);
        }
        Ok(buf)
    }
}

/// A transfer from one or more inputs to one or more outputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendMsg {
    pub inputs: Vec<InOut>,
    pub outputs: Vec<InOut>,
}

impl SendMsg {
    /// One input paying for every output, its coins being the per-denom sums.
    pub fn from_single_input(from: Address, outputs: Vec<InOut>) -> Self {
        let mut totals: BTreeMap<String, i64> = BTreeMap::new();
        for coin in outputs.iter().flat_map(|o| &o.coins) {
            let total = totals.entry(coin.denom.clone()).or_default();
            *total = total.saturating_add(coin.amount);
        }
        let input_coins = totals
            .into_iter()
            .map(|(denom, amount)| Token { amount, denom })
            .collect();

        Self {
            inputs: vec![InOut::new(from, input_coins)],
            outputs,
        }
    }

    fn sign_json(&self) -> serde_json::Value {
        json!({
            "inputs": self.inputs.iter().map(InOut::sign_json).collect::<Vec<_>>(),
            "outputs": self.outputs.iter().map(InOut::sign_json).collect::<Vec<_>>(),
        })
    }

    fn encode(&self) -> Result<Vec<u8>, ParseError> {
        let mut buf = SEND_MSG_PREFIX.to_vec();
        for input in &self.inputs {
            put_bytes_field(&mut buf, 1, &input.encode()?);
        }
        for output in &self.outputs {
            put_bytes_field(&mut buf, 2, &output.encode()?);
        }
        Ok(buf)
    }
}

/// Everything a signature commits to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StdSignMsg {
    pub chain_id: String,
    pub account_number: i64,
    pub sequence: i64,
    pub memo: String,
    pub msgs: Vec<SendMsg>,
    pub source: i64,
}

impl StdSignMsg {
    /// Canonical sign bytes: sorted JSON with the integers of the envelope as
    /// decimal strings and `data` null.
    pub fn sign_bytes(&self) -> serde_json::Result<Vec<u8>> {
        let doc = json!({
            "account_number": self.account_number.to_string(),
            "chain_id": self.chain_id,
            "data": null,
            "memo": self.memo,
            "msgs": self.msgs.iter().map(SendMsg::sign_json).collect::<Vec<_>>(),
            "sequence": self.sequence.to_string(),
            "source": self.source.to_string(),
        });
        canonical_json::to_sorted_vec(&doc)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StdSignature {
    pub pub_key: PubKey,
    pub signature: [u8; 64],
    pub account_number: i64,
    pub sequence: i64,
}

impl StdSignature {
    fn encode(&self) -> Vec<u8> {
        let key = self.pub_key.to_bytes();
        let mut pub_key = PUBKEY_PREFIX.to_vec();
        put_uvarint(&mut pub_key, key.len() as u64);
        pub_key.extend_from_slice(&key);

        let mut buf = Vec::new();
        put_bytes_field(&mut buf, 1, &pub_key);
        put_bytes_field(&mut buf, 2, &self.signature);
        put_uvarint_field(&mut buf, 3, self.account_number);
        put_uvarint_field(&mut buf, 4, self.sequence);
        buf
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StdTx {
    pub msgs: Vec<SendMsg>,
    pub signatures: Vec<StdSignature>,
    pub memo: String,
    pub source: i64,
    pub data: Vec<u8>,
}

impl StdTx {
    pub fn new(msg: StdSignMsg, signature: StdSignature) -> Self {
        Self {
            msgs: msg.msgs,
            signatures: vec![signature],
            memo: msg.memo,
            source: msg.source,
            data: Vec::new(),
        }
    }

    /// Length-prefixed amino bytes, as broadcast.
    pub fn encode(&self) -> Result<Vec<u8>, ParseError> {
        let mut body = STD_TX_PREFIX.to_vec();
        for msg in &self.msgs {
            put_bytes_field(&mut body, 1, &msg.encode()?);
        }
        for sig in &self.signatures {
            put_bytes_field(&mut body, 2, &sig.encode());
        }
        put_bytes_field(&mut body, 3, self.memo.as_bytes());
        put_uvarint_field(&mut body, 4, self.source);
        put_bytes_field(&mut body, 5, &self.data);

        let mut out = Vec::with_capacity(body.len() + 4);
        put_uvarint(&mut out, body.len() as u64);
        out.extend_from_slice(&body);
        Ok(out)
    }
}

/// The hash the chain assigns to a broadcast tx.
pub fn tx_hash(tx_bytes: &[u8]) -> TxId {
    TxId::from_digest(Sha256::digest(tx_bytes).into())
}

fn put_uvarint(buf: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        buf.push((v as u8) | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

fn put_key(buf: &mut Vec<u8>, field: u64, wire: u8) {
    put_uvarint(buf, (field << 3) | wire as u64);
}

fn put_bytes_field(buf: &mut Vec<u8>, field: u64, bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    put_key(buf, field, WIRE_BYTES);
    put_uvarint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Amino writes signed integers as the uvarint of their two's complement.
fn put_uvarint_field(buf: &mut Vec<u8>, field: u64, v: i64) {
    if v == 0 {
        return;
    }
    put_key(buf, field, WIRE_VARINT);
    put_uvarint(buf, v as u64);
}

#[cfg(test)]
mod tests {
    use secp256k1::{SecretKey, SECP256K1};

    use super::*;

    const FROM: &str = "tbnb1ggdcyhk8rc7fgzp8wa2su220aclcggcsd94ye5";
    const TO: &str = "tbnb1yxfyeda8pnlxlmx0z3cwx74w9xevspwdpzdxpj";

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    fn sample_msg() -> StdSignMsg {
        let outputs = vec![InOut::new(
            addr(TO),
            vec![
                Token {
                    amount: 5,
                    denom: "RUNE-A1F".into(),
                },
                Token {
                    amount: 194_765_912,
                    denom: "BNB".into(),
                },
            ],
        )];
        StdSignMsg {
            chain_id: "Binance-Chain-Nile".into(),
            account_number: 29,
            sequence: 3,
            memo: "OUT:1718".into(),
            msgs: vec![SendMsg::from_single_input(addr(FROM), outputs)],
            source: DEFAULT_SOURCE,
        }
    }

    #[test]
    fn test_uvarint() {
        let mut buf = Vec::new();
        put_uvarint(&mut buf, 300);
        assert_eq!(buf, vec![0xAC, 0x02]);
    }

    #[test]
    fn test_single_input_sums_per_denom() {
        let outputs = vec![
            InOut::new(
                addr(TO),
                vec![Token {
                    amount: 10,
                    denom: "BNB".into(),
                }],
            ),
            InOut::new(
                addr(FROM),
                vec![
                    Token {
                        amount: 7,
                        denom: "RUNE-A1F".into(),
                    },
                    Token {
                        amount: 5,
                        denom: "BNB".into(),
                    },
                ],
            ),
        ];
        let msg = SendMsg::from_single_input(addr(FROM), outputs);

        assert_eq!(msg.inputs.len(), 1);
        assert_eq!(
            msg.inputs[0].coins,
            vec![
                Token {
                    amount: 15,
                    denom: "BNB".into()
                },
                Token {
                    amount: 7,
                    denom: "RUNE-A1F".into()
                },
            ]
        );
        assert_eq!(msg.outputs[1].coins[0].denom, "BNB");
    }

    #[test]
    fn test_sign_bytes_layout() {
        let bytes = sample_msg().sign_bytes().unwrap();
        let expected = format!(
            concat!(
                r#"{{"account_number":"29","chain_id":"Binance-Chain-Nile","data":null,"memo":"OUT:1718","#,
                r#""msgs":[{{"inputs":[{{"address":"{from}","coins":[{{"amount":194765912,"denom":"BNB"}},{{"amount":5,"denom":"RUNE-A1F"}}]}}],"#,
                r#""outputs":[{{"address":"{to}","coins":[{{"amount":194765912,"denom":"BNB"}},{{"amount":5,"denom":"RUNE-A1F"}}]}}]}}],"#,
                r#""sequence":"3","source":"0"}}"#
            ),
            from = FROM,
            to = TO
        );
        assert_eq!(String::from_utf8(bytes).unwrap(), expected);
    }

    #[test]
    fn test_encode_std_tx() {
        let sk = SecretKey::from_slice(&[1u8; 32]).unwrap();
        let pub_key = PubKey::new(sk.public_key(SECP256K1));
        let msg = sample_msg();
        let sig = StdSignature {
            pub_key,
            signature: [0xAB; 64],
            account_number: msg.account_number,
            sequence: msg.sequence,
        };
        let tx = StdTx::new(msg, sig);

        let bytes = tx.encode().unwrap();

        // length prefix covers the rest
        let mut len = Vec::new();
        put_uvarint(&mut len, (bytes.len() - 2) as u64);
        assert_eq!(len.len(), 2);
        assert_eq!(&bytes[..2], &len[..]);
        assert_eq!(&bytes[2..6], &STD_TX_PREFIX);

        // first field is the send msg
        assert_eq!(bytes[6], 0x0A);
        let hex = hex::encode(&bytes);
        assert!(hex.contains("2a2c87fa"));
        assert!(hex.contains(&format!("eb5ae98721{}", hex::encode(pub_key.to_bytes()))));
        assert!(hex.contains(&hex::encode("OUT:1718")));
        // source 0 and empty data are omitted, so the memo ends the tx
        assert!(hex.ends_with(&hex::encode("OUT:1718")));

        assert_eq!(tx_hash(&bytes), tx_hash(&tx.encode().unwrap()));
        assert_eq!(tx_hash(&bytes).as_str().len(), 64);
    }
}
