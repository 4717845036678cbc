//! Outbound side of the bifrost: follows THORChain blocks for outbound
//! instructions and pays them out of the pool on Binance Chain.

pub mod errors;
pub mod handler;
pub mod signer;

#[cfg(test)]
pub(crate) mod test_utils;

pub use errors::{SignerError, SignerResult};
pub use handler::OutboundHandler;
pub use signer::{outbound_memo, Signer, SignerParams};
