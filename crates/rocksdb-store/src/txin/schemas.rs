use bifrost_db::entities::TxInStatusItem;

use crate::{define_table_with_height_key, define_table_without_codec, impl_json_value_codec};

define_table_with_height_key!(
    /// A table of observation batches not yet accepted by thorchain
    (TxInStatusSchema, "txin-process-status-") => TxInStatusItem
);
