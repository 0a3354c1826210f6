//! Tracing subscriber setup.

use tracing_subscriber::{fmt, EnvFilter};

/// Directive used when neither `--log-level` nor `RUST_LOG` is given.
pub const DEFAULT_LOG_DIRECTIVE: &str = "info";

/// Build the filter. An explicit level wins over `RUST_LOG`.
pub fn env_filter(level: Option<&str>) -> EnvFilter {
    match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE)),
    }
}

/// Install the global subscriber. Logs go to stderr so the console keeps
/// stdout for operator output.
pub fn init(level: Option<&str>) {
    let result = fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init();
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
