//! Rocksdb backed implementations of the `bifrost-db` traits.

pub mod scanner;
pub mod txin;
pub mod txout;

mod keys;
pub mod macros;
mod utils;

#[cfg(feature = "test_utils")]
pub mod test_utils;

use std::{fs, path::Path, sync::Arc};

use anyhow::Context;
use rockbound::{rocksdb, schema::ColumnFamilyName, OptimisticTransactionDB, Schema};
use tracing::*;

pub const ROCKSDB_NAME: &str = "bifrost";

/// Observer and signer share the layout, each only touches its own tables.
pub const STORE_COLUMN_FAMILIES: &[ColumnFamilyName] = &[
    // Scanner schemas
    ScanPosSchema::COLUMN_FAMILY_NAME,
    BlockStatusSchema::COLUMN_FAMILY_NAME,
    // Observation schemas
    TxInStatusSchema::COLUMN_FAMILY_NAME,
    // Signer schemas
    TxOutStatusSchema::COLUMN_FAMILY_NAME,
];

// Re-exports
pub use scanner::db::ScannerDb;
use scanner::schemas::{BlockStatusSchema, ScanPosSchema};
pub use txin::db::TxInDb;
use txin::schemas::TxInStatusSchema;
pub use txout::db::TxOutDb;
use txout::schemas::TxOutStatusSchema;

/// database operations configuration
#[derive(Clone, Copy, Debug)]
pub struct DbOpsConfig {
    pub retry_count: u16,
}

impl DbOpsConfig {
    pub fn new(retry_count: u16) -> Self {
        Self { retry_count }
    }
}

/// Opens (creating if needed) the store under `database_dir`.
pub fn open_rocksdb_database(database_dir: &Path) -> anyhow::Result<Arc<OptimisticTransactionDB>> {
    if !database_dir.exists() {
        fs::create_dir_all(database_dir)
            .with_context(|| format!("creating {}", database_dir.display()))?;
    }

    let mut opts = rocksdb::Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);

    let rbdb = OptimisticTransactionDB::open(
        database_dir,
        ROCKSDB_NAME,
        STORE_COLUMN_FAMILIES.iter().map(|s| s.to_string()),
        &opts,
    )
    .context("opening database")?;
    debug!(path = %database_dir.display(), "opened database");

    Ok(Arc::new(rbdb))
}
