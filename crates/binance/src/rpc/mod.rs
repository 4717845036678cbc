pub mod client;
pub mod error;
pub mod traits;
pub mod types;
