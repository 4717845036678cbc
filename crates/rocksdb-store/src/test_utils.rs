use std::sync::Arc;

use rockbound::{rocksdb, OptimisticTransactionDB};
use tempfile::TempDir;

use crate::{DbOpsConfig, ROCKSDB_NAME, STORE_COLUMN_FAMILIES};

/// Opens a fresh database in a temporary directory. The directory is leaked
/// so it outlives the handle for the duration of the test.
pub fn get_rocksdb_tmp_instance() -> anyhow::Result<(Arc<OptimisticTransactionDB>, DbOpsConfig)> {
    let dbname = ROCKSDB_NAME;
    let cfs = STORE_COLUMN_FAMILIES;
    let mut opts = rocksdb::Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);

    let temp_dir = TempDir::new()?.into_path();

    let rbdb = OptimisticTransactionDB::open(
        &temp_dir,
        dbname,
        cfs.iter().map(|s| s.to_string()),
        &opts,
    )?;

    let db_ops = DbOpsConfig { retry_count: 5 };

    Ok((Arc::new(rbdb), db_ops))
}
