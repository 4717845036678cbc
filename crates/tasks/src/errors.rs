use std::any::Any;

/// Reason a critical task stopped the process.
#[derive(Debug, thiserror::Error)]
pub enum CriticalTaskError {
    #[error("critical task `{task}` panicked{}", panic_suffix(.message))]
    Panicked {
        task: &'static str,
        message: Option<String>,
    },

    #[error("critical task `{task}` failed: {error}")]
    Failed { task: &'static str, error: String },
}

impl CriticalTaskError {
    pub(crate) fn panicked(task: &'static str, payload: Box<dyn Any + Send>) -> Self {
        // `panic!` payloads are either a formatted String or a literal.
        let message = match payload.downcast::<String>() {
            Ok(s) => Some(*s),
            Err(payload) => payload.downcast::<&str>().ok().map(|s| s.to_string()),
        };
        Self::Panicked { task, message }
    }

    pub fn task_name(&self) -> &'static str {
        match self {
            Self::Panicked { task, .. } | Self::Failed { task, .. } => task,
        }
    }
}

fn panic_suffix(message: &Option<String>) -> String {
    message
        .as_ref()
        .map(|m| format!(": `{m}`"))
        .unwrap_or_default()
}
