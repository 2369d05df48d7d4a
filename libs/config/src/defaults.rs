//! Runtime defaults
//!
//! Default values shared by the runtime crate and its configuration loader.

/// Shared thread pool defaults
pub mod pool {
    /// Worker count used when the host parallelism cannot be determined
    pub const FALLBACK_THREADS: usize = 4;

    /// Upper bound applied to the detected parallelism
    pub const MAX_DEFAULT_THREADS: usize = 16;

    /// Thread name prefix for pool workers (`<prefix>-<index>`)
    pub const THREAD_NAME_PREFIX: &str = "queue-pool";

    /// Number of pool workers for this host
    pub fn default_threads() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get().min(MAX_DEFAULT_THREADS))
            .unwrap_or(FALLBACK_THREADS)
    }
}

/// Dedicated worker thread defaults
pub mod worker {
    /// Thread name prefix for dedicated queue threads
    pub const THREAD_NAME_PREFIX: &str = "queue-worker";

    /// Stack size for dedicated queue threads (bytes)
    pub const STACK_SIZE: usize = 2 * 1024 * 1024;
}

/// Environment variable prefix for overrides (`QUEUE_ACTORS__POOL__THREADS=8`)
pub const ENV_PREFIX: &str = "QUEUE_ACTORS";

/// Separator between nested keys in environment overrides
pub const ENV_SEPARATOR: &str = "__";

/// Default log level when neither the file nor `RUST_LOG` sets one
pub const LOG_LEVEL: &str = "info";
