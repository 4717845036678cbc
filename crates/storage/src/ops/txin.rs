use std::sync::Arc;

use bifrost_db::{
    entities::{TxInStatus, TxInStatusItem},
    traits::*,
    DbResult,
};
use bifrost_primitives::tx::TxIn;

use crate::exec::*;

/// Database context for an database operation interface.
pub struct Context<D: TxInDatabase + Sync + Send + 'static> {
    db: Arc<D>,
}

impl<D: TxInDatabase + Sync + Send + 'static> Context<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self { db }
    }

    pub fn into_ops(self, pool: threadpool::ThreadPool) -> TxInOps {
        TxInOps::new(pool, Arc::new(self))
    }
}

inst_ops! {
    (TxInOps, Context<D: TxInDatabase>) {
        set_txin_status(tx_in: TxIn, status: TxInStatus) => ();
        get_txin_status(height: i64) => Option<TxInStatusItem>;
        remove_txin(height: i64) => ();
        get_txin_for_retry(failed_only: bool) => Vec<TxIn>;
    }
}

fn set_txin_status<D: TxInDatabase + Sync + Send + 'static>(
    context: &Context<D>,
    tx_in: TxIn,
    status: TxInStatus,
) -> DbResult<()> {
    context.db.set_txin_status(&tx_in, status)
}

fn get_txin_status<D: TxInDatabase + Sync + Send + 'static>(
    context: &Context<D>,
    height: i64,
) -> DbResult<Option<TxInStatusItem>> {
    context.db.get_txin_status(height)
}

fn remove_txin<D: TxInDatabase + Sync + Send + 'static>(
    context: &Context<D>,
    height: i64,
) -> DbResult<()> {
    context.db.remove_txin(height)
}

fn get_txin_for_retry<D: TxInDatabase + Sync + Send + 'static>(
    context: &Context<D>,
    failed_only: bool,
) -> DbResult<Vec<TxIn>> {
    context.db.get_txin_for_retry(failed_only)
}
