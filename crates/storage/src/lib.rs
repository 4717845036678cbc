//! Async facade over the storage traits.
//!
//! Every database call is shipped to a shared thread pool so async tasks never
//! block on rocksdb.

mod exec;
pub mod ops;

pub use ops::{scanner::ScannerOps, txin::TxInOps, txout::TxOutOps};
