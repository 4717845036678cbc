use std::{future::Future, panic::AssertUnwindSafe};

use futures_util::FutureExt;
use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle};
use tracing::*;

use crate::{
    errors::CriticalTaskError,
    registry::PendingTasks,
    shutdown::{ShutdownGuard, ShutdownSignal},
};

/// Spawns supervised tasks onto the runtime of its [`TaskManager`](crate::TaskManager).
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    handle: Handle,
    failed_tx: mpsc::UnboundedSender<CriticalTaskError>,
    signal: ShutdownSignal,
    pending: PendingTasks,
}

impl TaskExecutor {
    pub(crate) fn new(
        handle: Handle,
        failed_tx: mpsc::UnboundedSender<CriticalTaskError>,
        signal: ShutdownSignal,
        pending: PendingTasks,
    ) -> Self {
        Self {
            handle,
            failed_tx,
            signal,
            pending,
        }
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    /// Spawns `make_task(guard)`. Returning an error or panicking shuts the
    /// process down.
    pub fn spawn_critical_async_with_shutdown<F>(
        &self,
        name: &'static str,
        make_task: impl FnOnce(ShutdownGuard) -> F,
    ) -> JoinHandle<()>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let guard = ShutdownGuard::new(self.signal.clone(), self.pending.register(name));
        let task = make_task(guard);
        self.handle.spawn(supervise(name, self.failed_tx.clone(), task))
    }
}

async fn supervise(
    name: &'static str,
    failed_tx: mpsc::UnboundedSender<CriticalTaskError>,
    task: impl Future<Output = anyhow::Result<()>>,
) {
    let err = match AssertUnwindSafe(task).catch_unwind().await {
        Ok(Ok(())) => {
            debug!(task = name, "task exited");
            return;
        }
        Ok(Err(err)) => CriticalTaskError::Failed {
            task: name,
            error: format!("{err:#}"),
        },
        Err(payload) => CriticalTaskError::panicked(name, payload),
    };

    error!("{err}");
    // The manager may already be gone during teardown.
    let _ = failed_tx.send(err);
}
