use std::time::{Duration, Instant};

use tokio::{runtime::Handle, sync::mpsc};
use tracing::*;

use crate::{
    errors::CriticalTaskError, executor::TaskExecutor, registry::PendingTasks,
    shutdown::ShutdownSignal,
};

const DRAIN_POLL: Duration = Duration::from_millis(10);

/// Owns the shutdown signal and collects task failures. Lives on the main
/// thread, outside the runtime.
pub struct TaskManager {
    handle: Handle,
    failed_tx: mpsc::UnboundedSender<CriticalTaskError>,
    failed_rx: mpsc::UnboundedReceiver<CriticalTaskError>,
    signal: ShutdownSignal,
    pending: PendingTasks,
}

impl TaskManager {
    pub fn new(handle: Handle) -> Self {
        let (failed_tx, failed_rx) = mpsc::unbounded_channel();
        Self {
            handle,
            failed_tx,
            failed_rx,
            signal: ShutdownSignal::new(),
            pending: PendingTasks::default(),
        }
    }

    pub fn executor(&self) -> TaskExecutor {
        TaskExecutor::new(
            self.handle.clone(),
            self.failed_tx.clone(),
            self.signal.clone(),
            self.pending.clone(),
        )
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    /// Fires the shutdown signal on SIGINT or SIGTERM.
    pub fn start_signal_listeners(&self) {
        let signal = self.shutdown_signal();
        self.handle.spawn(async move {
            wait_for_termination().await;
            signal.send();
        });
    }

    /// Blocks until a task fails or shutdown is signalled, then waits up to
    /// `shutdown_timeout` for every task to return.
    ///
    /// Returns the first task failure, if any.
    pub fn monitor(mut self, shutdown_timeout: Option<Duration>) -> Result<(), CriticalTaskError> {
        let signal = self.signal.clone();
        let res = self.handle.clone().block_on(async {
            tokio::select! {
                failed = self.failed_rx.recv() => failed.map_or(Ok(()), Err),
                _ = signal.wait_for_shutdown() => Ok(()),
            }
        });

        self.signal.send();
        if !self.drain(shutdown_timeout) {
            warn!(pending = ?self.pending.names(), "shutdown timed out, forcing exit");
        }

        res
    }

    /// Waits for the pending set to empty. False on timeout.
    fn drain(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        while !self.pending.is_empty() {
            if deadline.is_some_and(|d| Instant::now() > d) {
                return false;
            }
            std::thread::sleep(DRAIN_POLL);
        }
        debug!("all tasks exited");
        true
    }
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(err) => {
            warn!(%err, "cannot listen for TERM, only INT will stop the process");
            let _ = tokio::signal::ctrl_c().await;
            warn!("got INT, shutting down");
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => warn!("got INT, shutting down"),
        _ = term.recv() => warn!("got TERM, shutting down"),
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
    warn!("got INT, shutting down");
}

#[cfg(test)]
mod tests {
    use std::panic;

    use super::*;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_panicking_task_stops_process() {
        let rt = runtime();
        let manager = TaskManager::new(rt.handle().clone());
        let executor = manager.executor();

        // Keep the expected panic out of the test output.
        let hook = panic::take_hook();
        panic::set_hook(Box::new(|_| {}));

        executor.spawn_critical_async_with_shutdown("idle", |shutdown| async move {
            shutdown.wait_for_shutdown().await;
            Ok(())
        });
        executor.spawn_critical_async_with_shutdown("scanner", |_| async move {
            panic!("intentional panic");
        });

        let err = manager
            .monitor(Some(Duration::from_secs(5)))
            .expect_err("should report the panic");
        panic::set_hook(hook);

        assert_eq!(err.task_name(), "scanner");
        assert!(
            matches!(&err, CriticalTaskError::Panicked { message: Some(m), .. } if m == "intentional panic"),
            "got {err:?}"
        );
    }

    #[test]
    fn test_failed_task_stops_process() {
        let rt = runtime();
        let manager = TaskManager::new(rt.handle().clone());

        manager
            .executor()
            .spawn_critical_async_with_shutdown("storage", |_| async move {
                Err(anyhow::anyhow!("disk went away"))
            });

        let err = manager
            .monitor(Some(Duration::from_secs(5)))
            .expect_err("should report the failure");
        assert_eq!(err.task_name(), "storage");
        assert!(err.to_string().contains("disk went away"));
    }

    #[test]
    fn test_signal_drains_tasks() {
        let rt = runtime();
        let manager = TaskManager::new(rt.handle().clone());
        let executor = manager.executor();

        for _ in 0..3 {
            executor.spawn_critical_async_with_shutdown("worker", |shutdown| async move {
                while !shutdown.should_shutdown() {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                Ok(())
            });
        }

        let signal = manager.shutdown_signal();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            signal.send();
        });

        let pending = manager.pending.clone();
        assert!(manager.monitor(Some(Duration::from_secs(5))).is_ok());
        assert!(pending.is_empty());
    }

    #[test]
    fn test_stuck_task_times_out() {
        let rt = runtime();
        let manager = TaskManager::new(rt.handle().clone());

        manager
            .executor()
            .spawn_critical_async_with_shutdown("stuck", |guard| async move {
                let _guard = guard;
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            });

        let pending = manager.pending.clone();
        manager.shutdown_signal().send();
        assert!(manager.monitor(Some(Duration::from_millis(50))).is_ok());
        assert_eq!(pending.names(), vec!["stuck"]);
    }
}
