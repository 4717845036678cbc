//! Crate includes reusable utils for the observer and signer services.
//! Such as initializing the tracing framework, retry policies, the
//! retrying HTTP client shared by every remote caller and the prometheus
//! counters.

pub mod http;
pub mod logging;
pub mod metrics;
pub mod retry;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
