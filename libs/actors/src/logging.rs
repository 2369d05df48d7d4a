//! Logging bootstrap
//!
//! Installs a `tracing-subscriber` fmt layer filtered by `RUST_LOG`, falling
//! back to the configured level when `RUST_LOG` is unset or invalid.

use crate::error::{Result, RuntimeError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Calling it again once a subscriber is
/// installed is a no-op.
pub fn init(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| RuntimeError::logging(format!("invalid log level '{}': {}", level, e)))?,
    };

    // Fails only when a global subscriber already exists.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .try_init();
    Ok(())
}
