use std::{
    pin::pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tokio::sync::Notify;

use crate::registry::Registration;

#[derive(Debug, Default)]
struct SignalState {
    fired: AtomicBool,
    notify: Notify,
}

/// Process-wide shutdown trigger. Cheap to clone, fires once.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<SignalState>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&self) {
        self.0.fired.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn should_shutdown(&self) -> bool {
        self.0.fired.load(Ordering::SeqCst)
    }

    /// Resolves once [`send`](Self::send) was called, immediately if it
    /// already was.
    pub async fn wait_for_shutdown(&self) {
        loop {
            // Register before checking the flag so a concurrent `send` cannot
            // slip in between.
            let mut notified = pin!(self.0.notify.notified());
            notified.as_mut().enable();

            if self.should_shutdown() {
                return;
            }
            notified.await;
        }
    }
}

/// Handed to every supervised task. The task counts as pending until the
/// guard is dropped, so it should return soon after shutdown fires.
#[derive(Debug)]
pub struct ShutdownGuard {
    signal: ShutdownSignal,
    _registration: Registration,
}

impl ShutdownGuard {
    pub(crate) fn new(signal: ShutdownSignal, registration: Registration) -> Self {
        Self {
            signal,
            _registration: registration,
        }
    }

    pub fn should_shutdown(&self) -> bool {
        self.signal.should_shutdown()
    }

    pub async fn wait_for_shutdown(&self) {
        self.signal.wait_for_shutdown().await
    }
}
