//! Inbound side of the bifrost: watches Binance Chain blocks for transfers to
//! the pool addresses and reports them to THORChain as observations.

pub mod errors;
pub mod handler;
pub mod pipeline;
pub mod pool;

pub use errors::{ObserverError, ObserverResult};
pub use handler::BinanceBlockHandler;
pub use pipeline::{ObservationPipeline, PipelineParams};
pub use pool::{PoolAddressManager, PoolAddressMatch, PoolAddressValidator};
