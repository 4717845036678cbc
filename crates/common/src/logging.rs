use std::env;

use tracing::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const SVC_LABEL_ENVVAR: &str = "BIFROST_SVC_LABEL";

const DEFAULT_LEVEL: &str = "info";

pub struct LoggerConfig {
    whoami: String,
    level: String,
    pretty: bool,
}

impl LoggerConfig {
    /// Creates a new instance with whoami set, logging at `info`.
    pub fn new(whoami: String) -> Self {
        Self {
            whoami,
            level: DEFAULT_LEVEL.to_owned(),
            pretty: false,
        }
    }

    pub fn with_base_name(s: &str) -> Self {
        Self::new(get_whoami_string(s))
    }

    pub fn set_level(&mut self, level: impl Into<String>) {
        self.level = level.into();
    }

    pub fn set_pretty(&mut self, pretty: bool) {
        self.pretty = pretty;
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::with_base_name("(bifrost-service)")
    }
}

/// Initializes the logging subsystem with the provided config.
pub fn init(config: LoggerConfig) {
    let (filt, bad_level) = build_filter(&config.level, env::var(EnvFilter::DEFAULT_ENV).ok());

    // Stdout logging.
    let stdout_sub = if config.pretty {
        tracing_subscriber::fmt::layer()
            .pretty()
            .with_filter(filt)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_filter(filt)
            .boxed()
    };

    tracing_subscriber::registry().with(stdout_sub).init();

    if let Some(level) = bad_level {
        warn!(%level, fallback = DEFAULT_LEVEL, "invalid log level, falling back");
    }
    info!(whoami = %config.whoami, "logging started");
}

/// Builds the filter from the configured level, appending any `RUST_LOG`
/// directives. Returns the rejected level when it had to fall back.
fn build_filter(level: &str, extra: Option<String>) -> (EnvFilter, Option<String>) {
    let (base, bad_level) = match level.trim().to_ascii_lowercase().parse::<Level>() {
        Ok(lvl) => (lvl.to_string().to_ascii_lowercase(), None),
        Err(_) => (DEFAULT_LEVEL.to_owned(), Some(level.to_owned())),
    };

    let directives = match extra.filter(|s| !s.trim().is_empty()) {
        Some(extra) => format!("{base},{extra}"),
        None => base.clone(),
    };

    let filt = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(base));
    (filt, bad_level)
}

/// Gets the service label from the standard envvar, which should be included
/// in the whoami string.
pub fn get_service_label_from_env() -> Option<String> {
    env::var(SVC_LABEL_ENVVAR).ok()
}

/// Computes a standard whoami string.
pub fn get_whoami_string(base: &str) -> String {
    match get_service_label_from_env() {
        Some(label) => format!("{base}%{label}"),
        None => base.to_string(),
    }
}
