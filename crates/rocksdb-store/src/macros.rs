// Adapted from sov-sdk's sov-db crate
#[macro_export]
macro_rules! define_table_without_codec {
    ($(#[$docs:meta])+ ( $table_name:ident ) $key:ty => $value:ty) => {
        $(#[$docs])+
        ///
        #[doc = concat!("Takes [`", stringify!($key), "`] as a key and returns [`", stringify!($value), "`]")]
        #[derive(Clone, Copy, Debug, Default)]
        pub(crate) struct $table_name;

        impl ::rockbound::schema::Schema for $table_name {
            const COLUMN_FAMILY_NAME: &'static str = $table_name::table_name();
            type Key = $key;
            type Value = $value;
        }

        impl $table_name {
            #[doc=concat!("Return ", stringify!($table_name), " as it is present inside the database.")]
            pub const fn table_name() -> &'static str {
                ::core::stringify!($table_name)
            }
        }

        impl ::std::fmt::Display for $table_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::core::write!(f, "{}", stringify!($table_name))
            }
        }
    };
}

/// Stores the value as JSON so records stay readable with generic tooling.
#[macro_export]
macro_rules! impl_json_value_codec {
    ($table_name:ident, $value:ty) => {
        impl ::rockbound::schema::ValueCodec<$table_name> for $value {
            fn encode_value(
                &self,
            ) -> ::std::result::Result<::std::vec::Vec<u8>, ::rockbound::CodecError> {
                ::serde_json::to_vec(self).map_err(|e| ::std::io::Error::from(e).into())
            }

            fn decode_value(data: &[u8]) -> ::std::result::Result<Self, ::rockbound::CodecError> {
                ::serde_json::from_slice(data).map_err(|e| ::std::io::Error::from(e).into())
            }
        }
    };
}

/// Defines a table keyed by block height where the key is written as the
/// literal string `{prefix}{height}`.
#[macro_export]
macro_rules! define_table_with_height_key {
    ($(#[$docs:meta])+ ($table_name:ident, $prefix:literal) => $value:ty) => {
        define_table_without_codec!($(#[$docs])+ ( $table_name ) i64 => $value);

        impl ::rockbound::schema::KeyEncoder<$table_name> for i64 {
            fn encode_key(&self) -> ::std::result::Result<::std::vec::Vec<u8>, ::rockbound::CodecError> {
                Ok(::std::format!("{}{}", $prefix, self).into_bytes())
            }
        }

        impl ::rockbound::schema::KeyDecoder<$table_name> for i64 {
            fn decode_key(data: &[u8]) -> ::std::result::Result<Self, ::rockbound::CodecError> {
                $crate::keys::parse_height_key($prefix, data).map_err(Into::into)
            }
        }

        impl_json_value_codec!($table_name, $value);
    };
}
