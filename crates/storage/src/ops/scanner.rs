use std::sync::Arc;

use bifrost_db::{entities::BlockScanStatus, traits::*, DbResult};

use crate::exec::*;

/// Database context for an database operation interface.
pub struct Context<D: ScannerDatabase + Sync + Send + 'static> {
    db: Arc<D>,
}

impl<D: ScannerDatabase + Sync + Send + 'static> Context<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self { db }
    }

    pub fn into_ops(self, pool: threadpool::ThreadPool) -> ScannerOps {
        ScannerOps::new(pool, Arc::new(self))
    }
}

inst_ops! {
    (ScannerOps, Context<D: ScannerDatabase>) {
        get_scan_pos() => Option<i64>;
        set_scan_pos(height: i64) => ();
        set_block_scan_status(height: i64, status: BlockScanStatus) => ();
        get_block_scan_status(height: i64) => Option<BlockScanStatus>;
        remove_block_status(height: i64) => ();
        get_blocks_for_retry(failed_only: bool) => Vec<i64>;
    }
}

fn get_scan_pos<D: ScannerDatabase + Sync + Send + 'static>(
    context: &Context<D>,
) -> DbResult<Option<i64>> {
    context.db.get_scan_pos()
}

fn set_scan_pos<D: ScannerDatabase + Sync + Send + 'static>(
    context: &Context<D>,
    height: i64,
) -> DbResult<()> {
    context.db.set_scan_pos(height)
}

fn set_block_scan_status<D: ScannerDatabase + Sync + Send + 'static>(
    context: &Context<D>,
    height: i64,
    status: BlockScanStatus,
) -> DbResult<()> {
    context.db.set_block_scan_status(height, status)
}

fn get_block_scan_status<D: ScannerDatabase + Sync + Send + 'static>(
    context: &Context<D>,
    height: i64,
) -> DbResult<Option<BlockScanStatus>> {
    context.db.get_block_scan_status(height)
}

fn remove_block_status<D: ScannerDatabase + Sync + Send + 'static>(
    context: &Context<D>,
    height: i64,
) -> DbResult<()> {
    context.db.remove_block_status(height)
}

fn get_blocks_for_retry<D: ScannerDatabase + Sync + Send + 'static>(
    context: &Context<D>,
    failed_only: bool,
) -> DbResult<Vec<i64>> {
    context.db.get_blocks_for_retry(failed_only)
}

#[cfg(test)]
mod tests {
    use bifrost_rocksdb::{test_utils::get_rocksdb_tmp_instance, ScannerDb};

    use super::*;

    fn get_ops() -> ScannerOps {
        let (db, db_ops) = get_rocksdb_tmp_instance().unwrap();
        let db = Arc::new(ScannerDb::new(db, db_ops));
        Context::new(db).into_ops(threadpool::ThreadPool::new(2))
    }

    #[tokio::test]
    async fn test_async_and_blocking_agree() {
        let ops = get_ops();

        ops.set_scan_pos_async(12).await.unwrap();
        assert_eq!(ops.get_scan_pos_blocking().unwrap(), Some(12));

        ops.set_block_scan_status_blocking(12, BlockScanStatus::Failed)
            .unwrap();
        assert_eq!(
            ops.get_block_scan_status_async(12).await.unwrap(),
            Some(BlockScanStatus::Failed)
        );
        assert_eq!(ops.get_blocks_for_retry_async(true).await.unwrap(), vec![12]);

        ops.remove_block_status_async(12).await.unwrap();
        assert!(ops.get_blocks_for_retry_async(false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_regression_error_propagates() {
        let ops = get_ops();
        ops.set_scan_pos_async(5).await.unwrap();

        let res = ops.set_scan_pos_async(4).await;
        assert!(res.is_err());
    }
}
