//! Runtime Error Types
//!
//! Errors raised while building queues, executors and runtimes. Nothing here
//! crosses a queue boundary: tasks themselves have no error channel.

use thiserror::Error;

/// Main runtime error type
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A worker thread could not be created
    #[error("Failed to spawn thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The Tokio dispatch backend was requested outside a Tokio runtime
    #[error("No Tokio runtime is available for the dispatch backend")]
    NoAsyncRuntime,

    /// Invalid runtime configuration
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Settings could not be loaded
    #[error("Failed to load settings: {0}")]
    Settings(#[from] anyhow::Error),

    /// The logging subscriber could not be installed
    #[error("Logging error: {message}")]
    Logging { message: String },
}

/// Result type alias for runtime construction
pub type Result<T> = std::result::Result<T, RuntimeError>;

impl RuntimeError {
    /// Create a thread spawn error
    pub fn spawn(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            name: name.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|f| f.to_string()),
        }
    }

    /// Create a logging error
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }

    /// Short category name for structured logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "spawn",
            Self::NoAsyncRuntime => "no_async_runtime",
            Self::Configuration { .. } => "configuration",
            Self::Settings(_) => "settings",
            Self::Logging { .. } => "logging",
        }
    }
}
