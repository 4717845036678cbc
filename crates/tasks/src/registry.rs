//! Names of the tasks that still hold a [`ShutdownGuard`](crate::ShutdownGuard).

use std::{collections::BTreeMap, sync::Arc};

use parking_lot::Mutex;

#[derive(Debug, Clone, Default)]
pub(crate) struct PendingTasks(Arc<Mutex<BTreeMap<&'static str, usize>>>);

impl PendingTasks {
    pub(crate) fn register(&self, name: &'static str) -> Registration {
        *self.0.lock().entry(name).or_default() += 1;
        Registration {
            name,
            tasks: self.clone(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// `name` or `name x{count}` for every task still running.
    pub(crate) fn names(&self) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .map(|(name, count)| match count {
                1 => name.to_string(),
                n => format!("{name} x{n}"),
            })
            .collect()
    }

    fn release(&self, name: &'static str) {
        let mut tasks = self.0.lock();
        if let Some(count) = tasks.get_mut(name) {
            *count -= 1;
            if *count == 0 {
                tasks.remove(name);
            }
        }
    }
}

/// Keeps its task listed as pending until dropped.
#[derive(Debug)]
pub(crate) struct Registration {
    name: &'static str,
    tasks: PendingTasks,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.tasks.release(self.name);
    }
}
