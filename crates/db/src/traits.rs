//! Trait definitions for low level database interfaces.

use bifrost_primitives::tx::TxIn;

use crate::{
    entities::{BlockScanStatus, TxInStatus, TxInStatusItem, TxOutStatusItem},
    DbResult,
};

/// Progress of a block scanner: the scan position plus the status of every
/// height that is not finished yet.
pub trait ScannerDatabase {
    /// Last height handed to the workers, if any.
    fn get_scan_pos(&self) -> DbResult<Option<i64>>;

    /// Moves the scan position forward. Moving it backwards is an error.
    fn set_scan_pos(&self, height: i64) -> DbResult<()>;

    fn set_block_scan_status(&self, height: i64, status: BlockScanStatus) -> DbResult<()>;

    fn get_block_scan_status(&self, height: i64) -> DbResult<Option<BlockScanStatus>>;

    /// Marks the height finished.
    fn remove_block_status(&self, height: i64) -> DbResult<()>;

    /// Heights to re-publish in ascending order: only `Failed` ones, or every
    /// unfinished one when `failed_only` is false.
    fn get_blocks_for_retry(&self, failed_only: bool) -> DbResult<Vec<i64>>;
}

/// Observation batches that were not yet accepted by the chain.
pub trait TxInDatabase {
    fn set_txin_status(&self, tx_in: &TxIn, status: TxInStatus) -> DbResult<()>;

    fn get_txin_status(&self, height: i64) -> DbResult<Option<TxInStatusItem>>;

    fn remove_txin(&self, height: i64) -> DbResult<()>;

    /// Batches to resubmit in ascending height order.
    fn get_txin_for_retry(&self, failed_only: bool) -> DbResult<Vec<TxIn>>;
}

/// Outbound batches owned by the signer, keyed by chain height.
pub trait TxOutDatabase {
    fn put_txout(&self, item: &TxOutStatusItem) -> DbResult<()>;

    fn get_txout(&self, height: i64) -> DbResult<Option<TxOutStatusItem>>;

    /// Marks the batch acknowledged.
    fn remove_txout(&self, height: i64) -> DbResult<()>;

    /// Batches to re-drive in ascending height order, see
    /// [`TxOutStatus::needs_retry`](crate::entities::TxOutStatus::needs_retry).
    fn get_txout_for_retry(&self, failed_only: bool) -> DbResult<Vec<TxOutStatusItem>>;
}
