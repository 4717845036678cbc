use std::sync::Arc;

use bifrost_db::{
    entities::{TxInStatus, TxInStatusItem},
    traits::TxInDatabase,
    DbResult,
};
use bifrost_primitives::tx::TxIn;
use rockbound::{OptimisticTransactionDB as DB, SchemaDBOperationsExt};

use super::schemas::TxInStatusSchema;
use crate::utils::get_all_by_height;

pub struct TxInDb {
    db: Arc<DB>,
}

impl TxInDb {
    pub fn new(db: Arc<DB>) -> Self {
        Self { db }
    }
}

impl TxInDatabase for TxInDb {
    fn set_txin_status(&self, tx_in: &TxIn, status: TxInStatus) -> DbResult<()> {
        let item = TxInStatusItem {
            tx_in: tx_in.clone(),
            status,
        };
        Ok(self
            .db
            .put::<TxInStatusSchema>(&tx_in.block_height, &item)?)
    }

    fn get_txin_status(&self, height: i64) -> DbResult<Option<TxInStatusItem>> {
        Ok(self.db.get::<TxInStatusSchema>(&height)?)
    }

    fn remove_txin(&self, height: i64) -> DbResult<()> {
        Ok(self.db.delete::<TxInStatusSchema>(&height)?)
    }

    fn get_txin_for_retry(&self, failed_only: bool) -> DbResult<Vec<TxIn>> {
        let batches = get_all_by_height::<TxInStatusSchema>(&self.db)?
            .into_iter()
            .filter(|(_, item)| !failed_only || item.status == TxInStatus::Failed)
            .map(|(_, item)| item.tx_in)
            .collect();
        Ok(batches)
    }
}
