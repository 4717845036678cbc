//! Everything that talks to Binance Chain: the node RPC and DEX REST client,
//! the amino wire format of a signed send, and the two ways of producing a
//! signature (a local key or a remote TSS party).

pub mod amino;
pub mod keys;
pub mod rpc;

pub use rpc::{
    client::BinanceClient,
    error::{ClientError, ClientResult},
    traits::{Broadcaster, Reader},
};
