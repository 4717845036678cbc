//! Critical task supervision.
//!
//! Every long-running worker of the observer and signer is spawned through a
//! [`TaskExecutor`]. If any of them panics or returns an error the
//! [`TaskManager`] broadcasts the shutdown signal and waits for the remaining
//! tasks to drain.

mod errors;
mod executor;
mod manager;
mod registry;
mod shutdown;

pub use errors::CriticalTaskError;
pub use executor::TaskExecutor;
pub use manager::TaskManager;
pub use shutdown::{ShutdownGuard, ShutdownSignal};
