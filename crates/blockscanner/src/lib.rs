//! Generic block scanner shared by the observer and the signer.
//!
//! The scanner follows a chain tip through a [`HeightFetcher`], hands every
//! new height to a pool of workers running a [`BlockHandler`], and keeps the
//! scan position plus per-height status in storage so failed heights are
//! retried and a restart never skips one.

pub mod errors;
pub mod fetcher;
pub mod scanner;

pub use errors::{BlockError, ScannerError, ScannerResult};
pub use fetcher::{HeightFetcher, RpcBlockHeightFetcher};
pub use scanner::{BlockHandler, BlockScanner, ScannerParams};
