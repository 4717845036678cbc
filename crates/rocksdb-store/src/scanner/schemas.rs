use bifrost_db::entities::BlockStatusItem;

use crate::{
    define_table_with_height_key, define_table_without_codec, impl_json_value_codec,
    keys::{decode_varint, encode_varint},
};

/// The scan position lives under a single fixed key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ScanPosKey;

const SCAN_POS_KEY: &[u8] = b"blockscanpos";

define_table_without_codec!(
    /// A table holding the last height handed to the block workers
    (ScanPosSchema) ScanPosKey => i64
);

impl ::rockbound::schema::KeyEncoder<ScanPosSchema> for ScanPosKey {
    fn encode_key(&self) -> Result<Vec<u8>, ::rockbound::CodecError> {
        Ok(SCAN_POS_KEY.to_vec())
    }
}

impl ::rockbound::schema::KeyDecoder<ScanPosSchema> for ScanPosKey {
    fn decode_key(data: &[u8]) -> Result<Self, ::rockbound::CodecError> {
        if data != SCAN_POS_KEY {
            return Err(::rockbound::CodecError::InvalidKeyLength {
                expected: SCAN_POS_KEY.len(),
                got: data.len(),
            });
        }
        Ok(ScanPosKey)
    }
}

impl ::rockbound::schema::ValueCodec<ScanPosSchema> for i64 {
    fn encode_value(&self) -> Result<Vec<u8>, ::rockbound::CodecError> {
        Ok(encode_varint(*self))
    }

    fn decode_value(data: &[u8]) -> Result<Self, ::rockbound::CodecError> {
        decode_varint(data).map_err(Into::into)
    }
}

define_table_with_height_key!(
    /// A table of heights that are scheduled, in flight or failed
    (BlockStatusSchema, "block-process-status-") => BlockStatusItem
);
