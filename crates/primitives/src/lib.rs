//! Collection of data types shared by the observer and the signer.
//!
//! Everything that crosses a process boundary (remote JSON, storage values,
//! chain messages) is expressed with these types, and every constructor
//! validates its input so malformed remote data is rejected on ingress.

pub mod amount;
pub mod asset;
pub mod canonical_json;
pub mod chain;
pub mod coin;
pub mod errors;
pub mod keys;
pub mod pool;
pub mod serde_utils;
pub mod tx;
pub mod txid;

pub mod prelude;
