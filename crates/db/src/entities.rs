//! Values persisted by the scanner, the observation pipeline and the signer.

use bifrost_primitives::{
    tx::{TxIn, TxOut},
    txid::TxId,
};
use serde::{Deserialize, Serialize};

/// Processing state of one scanned height. `Finished` heights are deleted
/// rather than stored, the variant exists for completeness of the lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockScanStatus {
    NotStarted,
    Processing,
    Failed,
    Finished,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStatusItem {
    pub height: i64,
    pub status: BlockScanStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxInStatus {
    Processing,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInStatusItem {
    pub tx_in: TxIn,
    pub status: TxInStatus,
}

/// A signed Binance transaction kept around until the broadcast is confirmed,
/// so a restart never signs the same instruction twice with different
/// sequences.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
    pub tx_hex: String,
    pub hash: TxId,
    pub account_number: u64,
    pub sequence: u64,
}

/// Lifecycle of an outbound batch. `Acknowledged` is represented by deletion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TxOutStatus {
    Pending,
    Signing { signed: Option<SignedTx> },
    Broadcast { hash: TxId },
    /// `signed` keeps a tx that may have reached the chain before the
    /// failure, so a retry reconciles it instead of signing again.
    Failed {
        reason: String,
        permanent: bool,
        #[serde(default)]
        signed: Option<SignedTx>,
    },
}

impl TxOutStatus {
    /// Whether a retry pass should pick the batch up. Permanent failures
    /// wait for an operator. A broadcast batch only lacks its report, which
    /// is always safe to repeat.
    pub fn needs_retry(&self, failed_only: bool) -> bool {
        match self {
            Self::Failed { permanent, .. } => !permanent,
            Self::Broadcast { .. } => true,
            _ => !failed_only,
        }
    }

    /// The signed tx of the last signing attempt, if one is recorded.
    pub fn signed(&self) -> Option<&SignedTx> {
        match self {
            Self::Signing { signed } | Self::Failed { signed, .. } => signed.as_ref(),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutStatusItem {
    pub tx_out: TxOut,
    pub status: TxOutStatus,
}

impl TxOutStatusItem {
    pub fn pending(tx_out: TxOut) -> Self {
        Self {
            tx_out,
            status: TxOutStatus::Pending,
        }
    }

    pub fn height(&self) -> i64 {
        self.tx_out.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_status_json() {
        let item = BlockStatusItem {
            height: 10,
            status: BlockScanStatus::NotStarted,
        };
        assert_eq!(
            serde_json::to_string(&item).unwrap(),
            r#"{"height":10,"status":"not_started"}"#
        );
    }

    #[test]
    fn test_txout_retry_selection() {
        let transient = TxOutStatus::Failed {
            reason: "broadcast".into(),
            permanent: false,
            signed: None,
        };
        let permanent = TxOutStatus::Failed {
            reason: "BROKEN SIGNATURE".into(),
            permanent: true,
            signed: None,
        };

        assert!(transient.needs_retry(true));
        assert!(!permanent.needs_retry(true));
        assert!(!permanent.needs_retry(false));
        assert!(!TxOutStatus::Pending.needs_retry(true));
        assert!(TxOutStatus::Pending.needs_retry(false));
        assert!(TxOutStatus::Signing { signed: None }.needs_retry(false));
        assert!(!TxOutStatus::Signing { signed: None }.needs_retry(true));
    }
}
