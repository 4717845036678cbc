use std::sync::Arc;

use bifrost_db::{entities::TxOutStatusItem, traits::TxOutDatabase, DbResult};
use rockbound::{OptimisticTransactionDB as DB, SchemaDBOperationsExt};

use super::schemas::TxOutStatusSchema;
use crate::utils::get_all_by_height;

pub struct TxOutDb {
    db: Arc<DB>,
}

impl TxOutDb {
    pub fn new(db: Arc<DB>) -> Self {
        Self { db }
    }
}

impl TxOutDatabase for TxOutDb {
    fn put_txout(&self, item: &TxOutStatusItem) -> DbResult<()> {
        Ok(self.db.put::<TxOutStatusSchema>(&item.height(), item)?)
    }

    fn get_txout(&self, height: i64) -> DbResult<Option<TxOutStatusItem>> {
        Ok(self.db.get::<TxOutStatusSchema>(&height)?)
    }

    fn remove_txout(&self, height: i64) -> DbResult<()> {
        Ok(self.db.delete::<TxOutStatusSchema>(&height)?)
    }

    fn get_txout_for_retry(&self, failed_only: bool) -> DbResult<Vec<TxOutStatusItem>> {
        let items = get_all_by_height::<TxOutStatusSchema>(&self.db)?
            .into_iter()
            .map(|(_, item)| item)
            .filter(|item| item.status.needs_retry(failed_only))
            .collect();
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use bifrost_db::entities::{SignedTx, TxOutStatus};
    use bifrost_primitives::{tx::TxOut, txid::TxId};

    use super::*;
    use crate::test_utils::get_rocksdb_tmp_instance;

    fn setup_db() -> TxOutDb {
        let (db, _) = get_rocksdb_tmp_instance().unwrap();
        TxOutDb::new(db)
    }

    fn item(height: i64, status: TxOutStatus) -> TxOutStatusItem {
        TxOutStatusItem {
            tx_out: TxOut {
                height,
                hash: String::new(),
                chain: None,
                tx_array: Vec::new(),
            },
            status,
        }
    }

    #[test]
    fn test_put_get_remove() {
        let db = setup_db();
        let signed = SignedTx {
            tx_hex: "c401f0625dee".to_string(),
            hash: TxId::from_digest([7; 32]),
            account_number: 3,
            sequence: 9,
        };
        let entry = item(
            55,
            TxOutStatus::Signing {
                signed: Some(signed),
            },
        );

        db.put_txout(&entry).unwrap();
        assert_eq!(db.get_txout(55).unwrap(), Some(entry));

        db.remove_txout(55).unwrap();
        assert_eq!(db.get_txout(55).unwrap(), None);
    }

    #[test]
    fn test_txout_for_retry_skips_permanent_failures() {
        let db = setup_db();
        db.put_txout(&item(80, TxOutStatus::Pending)).unwrap();
        db.put_txout(&item(
            9,
            TxOutStatus::Failed {
                reason: "timeout".to_string(),
                permanent: false,
                signed: None,
            },
        ))
        .unwrap();
        db.put_txout(&item(
            10,
            TxOutStatus::Failed {
                reason: "BROKEN SIGNATURE".to_string(),
                permanent: true,
                signed: None,
            },
        ))
        .unwrap();

        let failed: Vec<i64> = db
            .get_txout_for_retry(true)
            .unwrap()
            .iter()
            .map(|i| i.height())
            .collect();
        assert_eq!(failed, vec![9]);

        let all: Vec<i64> = db
            .get_txout_for_retry(false)
            .unwrap()
            .iter()
            .map(|i| i.height())
            .collect();
        assert_eq!(all, vec![9, 80]);
    }
}
