//! Errors during parsing/handling/conversion of primitives.

use thiserror::Error;

/// Parsing errors for anything received from a remote party or a config
/// file: chains, assets, amounts, keys, addresses and tx ids.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid chain '{0}': {1}")]
    InvalidChain(String, &'static str),

    #[error("invalid ticker '{0}': {1}")]
    InvalidTicker(String, &'static str),

    #[error("invalid symbol '{0}'")]
    InvalidSymbol(String),

    #[error("invalid amount '{0}'")]
    InvalidAmount(String),

    #[error("amount '{0}' does not fit 256 bits")]
    AmountOverflow(String),

    #[error("invalid tx id '{0}': {1}")]
    InvalidTxId(String, &'static str),

    #[error("invalid pubkey: {0}")]
    InvalidPubkey(String),

    #[error("invalid address '{0}': {1}")]
    InvalidAddress(String, String),
}
