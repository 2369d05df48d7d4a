//! # Queue Actors Configuration
//!
//! Configuration and default constants for the queue-bound actor runtime.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use queue_config::RuntimeSettings;
//!
//! let settings = RuntimeSettings::load(Some("config/runtime.toml".as_ref()))?;
//! assert!(settings.pool.threads > 0);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod defaults;
pub mod settings;

pub use settings::{BackendKind, PoolSettings, RuntimeSettings, WorkerSettings};
