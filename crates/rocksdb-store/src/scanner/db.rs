use std::sync::Arc;

use bifrost_db::{
    entities::{BlockScanStatus, BlockStatusItem},
    errors::DbError,
    traits::ScannerDatabase,
    DbResult,
};
use rockbound::{OptimisticTransactionDB as DB, SchemaDBOperationsExt, TransactionRetry};

use super::schemas::{BlockStatusSchema, ScanPosKey, ScanPosSchema};
use crate::{utils::get_all_by_height, DbOpsConfig};

pub struct ScannerDb {
    db: Arc<DB>,
    ops: DbOpsConfig,
}

impl ScannerDb {
    pub fn new(db: Arc<DB>, ops: DbOpsConfig) -> Self {
        Self { db, ops }
    }
}

impl ScannerDatabase for ScannerDb {
    fn get_scan_pos(&self) -> DbResult<Option<i64>> {
        Ok(self.db.get::<ScanPosSchema>(&ScanPosKey)?)
    }

    fn set_scan_pos(&self, height: i64) -> DbResult<()> {
        self.db
            .with_optimistic_txn(TransactionRetry::Count(self.ops.retry_count), |txn| {
                if let Some(current) = txn.get::<ScanPosSchema>(&ScanPosKey)? {
                    if height < current {
                        return Err(DbError::ScanPosRegression {
                            current,
                            requested: height,
                        });
                    }
                }
                txn.put::<ScanPosSchema>(&ScanPosKey, &height)?;
                Ok(())
            })
            .map_err(|e| DbError::TransactionError(e.to_string()))
    }

    fn set_block_scan_status(&self, height: i64, status: BlockScanStatus) -> DbResult<()> {
        let item = BlockStatusItem { height, status };
        Ok(self.db.put::<BlockStatusSchema>(&height, &item)?)
    }

    fn get_block_scan_status(&self, height: i64) -> DbResult<Option<BlockScanStatus>> {
        Ok(self
            .db
            .get::<BlockStatusSchema>(&height)?
            .map(|item| item.status))
    }

    fn remove_block_status(&self, height: i64) -> DbResult<()> {
        Ok(self.db.delete::<BlockStatusSchema>(&height)?)
    }

    fn get_blocks_for_retry(&self, failed_only: bool) -> DbResult<Vec<i64>> {
        let heights = get_all_by_height::<BlockStatusSchema>(&self.db)?
            .into_iter()
            .filter(|(_, item)| match item.status {
                BlockScanStatus::Finished => false,
                BlockScanStatus::Failed => true,
                _ => !failed_only,
            })
            .map(|(height, _)| height)
            .collect();
        Ok(heights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::get_rocksdb_tmp_instance;

    fn setup_db() -> ScannerDb {
        let (db, db_ops) = get_rocksdb_tmp_instance().unwrap();
        ScannerDb::new(db, db_ops)
    }

    #[test]
    fn test_scan_pos() {
        let db = setup_db();
        assert_eq!(db.get_scan_pos().unwrap(), None);

        db.set_scan_pos(100).unwrap();
        db.set_scan_pos(100).unwrap();
        db.set_scan_pos(101).unwrap();
        assert_eq!(db.get_scan_pos().unwrap(), Some(101));
    }

    #[test]
    fn test_scan_pos_cannot_regress() {
        let db = setup_db();
        db.set_scan_pos(10).unwrap();

        assert!(db.set_scan_pos(9).is_err());
        assert_eq!(db.get_scan_pos().unwrap(), Some(10));
    }

    #[test]
    fn test_block_status_lifecycle() {
        let db = setup_db();

        db.set_block_scan_status(5, BlockScanStatus::Processing).unwrap();
        assert_eq!(
            db.get_block_scan_status(5).unwrap(),
            Some(BlockScanStatus::Processing)
        );

        db.remove_block_status(5).unwrap();
        assert_eq!(db.get_block_scan_status(5).unwrap(), None);
    }

    #[test]
    fn test_blocks_for_retry_sorted_numerically() {
        let db = setup_db();
        db.set_block_scan_status(100, BlockScanStatus::Failed).unwrap();
        db.set_block_scan_status(9, BlockScanStatus::Processing).unwrap();
        db.set_block_scan_status(20, BlockScanStatus::Failed).unwrap();
        db.set_block_scan_status(3, BlockScanStatus::NotStarted).unwrap();

        assert_eq!(db.get_blocks_for_retry(true).unwrap(), vec![20, 100]);
        assert_eq!(db.get_blocks_for_retry(false).unwrap(), vec![3, 9, 20, 100]);
    }
}
