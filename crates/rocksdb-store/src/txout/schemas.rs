use bifrost_db::entities::TxOutStatusItem;

use crate::{define_table_with_height_key, define_table_without_codec, impl_json_value_codec};

define_table_with_height_key!(
    /// A table of outbound batches owned by the signer
    (TxOutStatusSchema, "txout-process-status-") => TxOutStatusItem
);
