//! Storage interfaces of the observer and signer.
//!
//! The traits here are implemented by `bifrost-rocksdb` and consumed through
//! the thread-pool backed ops in `bifrost-storage`.

pub mod entities;
pub mod errors;
pub mod traits;

pub use errors::{DbError, DbResult};
