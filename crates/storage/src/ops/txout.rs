use std::sync::Arc;

use bifrost_db::{entities::TxOutStatusItem, traits::*, DbResult};

use crate::exec::*;

/// Database context for an database operation interface.
pub struct Context<D: TxOutDatabase + Sync + Send + 'static> {
    db: Arc<D>,
}

impl<D: TxOutDatabase + Sync + Send + 'static> Context<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self { db }
    }

    pub fn into_ops(self, pool: threadpool::ThreadPool) -> TxOutOps {
        TxOutOps::new(pool, Arc::new(self))
    }
}

inst_ops! {
    (TxOutOps, Context<D: TxOutDatabase>) {
        put_txout(item: TxOutStatusItem) => ();
        get_txout(height: i64) => Option<TxOutStatusItem>;
        remove_txout(height: i64) => ();
        get_txout_for_retry(failed_only: bool) => Vec<TxOutStatusItem>;
    }
}

fn put_txout<D: TxOutDatabase + Sync + Send + 'static>(
    context: &Context<D>,
    item: TxOutStatusItem,
) -> DbResult<()> {
    context.db.put_txout(&item)
}

fn get_txout<D: TxOutDatabase + Sync + Send + 'static>(
    context: &Context<D>,
    height: i64,
) -> DbResult<Option<TxOutStatusItem>> {
    context.db.get_txout(height)
}

fn remove_txout<D: TxOutDatabase + Sync + Send + 'static>(
    context: &Context<D>,
    height: i64,
) -> DbResult<()> {
    context.db.remove_txout(height)
}

fn get_txout_for_retry<D: TxOutDatabase + Sync + Send + 'static>(
    context: &Context<D>,
    failed_only: bool,
) -> DbResult<Vec<TxOutStatusItem>> {
    context.db.get_txout_for_retry(failed_only)
}
