//! Client for the THORChain REST API: the queries the observer and signer
//! poll, and the signed cosmos transactions they submit.

mod client;
mod errors;
pub mod keys;
pub mod messages;
mod traits;
pub mod types;

pub use client::{ThorchainClient, WhitelistPolicy};
pub use errors::{ClientError, ClientResult};
#[cfg(feature = "mocks")]
pub use traits::MockThorchainRpc;
pub use traits::ThorchainRpc;
