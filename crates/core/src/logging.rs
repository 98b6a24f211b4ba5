//! Logging bootstrap built on `tracing-subscriber`.

use tracing_subscriber::{fmt, EnvFilter};

/// Output format for the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Install a global subscriber honouring `RUST_LOG`, falling back to
/// `default_filter` when it is unset. Returns false if a subscriber was
/// already installed.
pub fn init(default_filter: &str, format: LogFormat) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let result = match format {
        LogFormat::Pretty => fmt().with_env_filter(filter).try_init(),
        LogFormat::Json => fmt().json().with_env_filter(filter).try_init(),
    };
    result.is_ok()
}
