use bifrost_db::DbResult;
use rockbound::{OptimisticTransactionDB as DB, Schema, SchemaDBOperationsExt};

/// Reads every entry of a height keyed table in ascending height order.
///
/// Keys are decimal strings, so rocksdb's byte order is not numeric and the
/// entries are sorted after the scan.
pub(crate) fn get_all_by_height<T>(db: &DB) -> DbResult<Vec<(i64, T::Value)>>
where
    T: Schema<Key = i64>,
{
    let mut iterator = db.iter::<T>()?;
    iterator.seek_to_first();

    let mut entries = Vec::new();
    for res in iterator {
        let (height, value) = res?.into_tuple();
        entries.push((height, value));
    }
    entries.sort_by_key(|(height, _)| *height);
    Ok(entries)
}
