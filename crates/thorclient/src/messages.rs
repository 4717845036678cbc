//! Messages the bifrost submits to THORChain, in their amino JSON form.

use bifrost_primitives::{
    keys::Address,
    serde_utils::i64_string,
    tx::ObservedTx,
    txid::TxId,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ChainMsg {
    /// Votes for inbound transactions seen on an external chain.
    #[serde(rename = "thorchain/ObservedTxIn")]
    ObservedTxIn { txs: Vec<ObservedTx>, signer: Address },

    /// Reports the hash of an outbound transfer the signer broadcast.
    #[serde(rename = "thorchain/MsgOutboundTx")]
    OutboundTx {
        #[serde(with = "i64_string")]
        height: i64,
        tx_id: TxId,
        memo: String,
        signer: Address,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_json_shape() {
        let msg = ChainMsg::OutboundTx {
            height: 1718,
            tx_id: TxId::new(&"a".repeat(64)).unwrap(),
            memo: "OUT:1718".into(),
            signer: Address::new("tbnb1ggdcyhk8rc7fgzp8wa2su220aclcggcsd94ye5").unwrap(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "thorchain/MsgOutboundTx");
        assert_eq!(json["value"]["height"], "1718");
        assert_eq!(json["value"]["tx_id"], "A".repeat(64));
    }
}
