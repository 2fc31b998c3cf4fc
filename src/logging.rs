//! Logging initialization

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `level` (or "info") is used. Calling this
/// more than once keeps the first subscriber.
pub fn init_logging(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));

    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
