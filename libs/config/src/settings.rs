//! Runtime Settings
//!
//! Loads runtime configuration from an optional TOML file with environment
//! variable overrides layered on top.

use crate::defaults;
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Complete runtime configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Shared thread pool used by pool-backed queues and free dispatch
    pub pool: PoolSettings,

    /// Dedicated worker threads (one per thread-backed queue)
    pub worker: WorkerSettings,

    /// Backend used by `Runtime::queue`
    pub backend: BackendKind,

    /// Log level passed to the tracing subscriber
    pub log_level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PoolSettings {
    pub threads: usize,
    pub thread_name_prefix: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct WorkerSettings {
    pub thread_name_prefix: String,
    pub stack_size: usize,
}

/// Execution substrate for a task queue
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Slot borrowed from the shared thread pool on every wake
    #[default]
    Pool,
    /// Dedicated worker thread parked on a condition variable
    Thread,
    /// Blocking-task dispatch on the ambient Tokio runtime
    Tokio,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            threads: defaults::pool::default_threads(),
            thread_name_prefix: defaults::pool::THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            thread_name_prefix: defaults::worker::THREAD_NAME_PREFIX.to_string(),
            stack_size: defaults::worker::STACK_SIZE,
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            pool: PoolSettings::default(),
            worker: WorkerSettings::default(),
            backend: BackendKind::default(),
            log_level: defaults::LOG_LEVEL.to_string(),
        }
    }
}

impl RuntimeSettings {
    /// Load settings from `path` (if given) with environment overrides.
    ///
    /// The path may contain `~` and `$VAR` references. A missing file is an
    /// error when a path is given explicitly.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            let expanded = expand_path(path)?;
            info!("Loading runtime settings from {:?}", expanded);
            builder = builder.add_source(File::from(expanded).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(defaults::ENV_PREFIX)
                .separator(defaults::ENV_SEPARATOR)
                .try_parsing(true),
        );

        let config = builder.build()
            .context("Failed to build runtime configuration")?;

        let settings: Self = config.try_deserialize()
            .context("Failed to deserialize runtime configuration")?;

        settings.validate()?;
        debug!(
            pool_threads = settings.pool.threads,
            backend = ?settings.backend,
            "Runtime settings loaded"
        );
        Ok(settings)
    }

    /// Reject settings the runtime cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.pool.threads == 0 {
            bail!("pool.threads must be at least 1");
        }
        if self.pool.thread_name_prefix.is_empty() {
            bail!("pool.thread_name_prefix must not be empty");
        }
        if self.worker.thread_name_prefix.is_empty() {
            bail!("worker.thread_name_prefix must not be empty");
        }
        Ok(())
    }
}

impl RuntimeSettings {
    /// Render the effective settings as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize runtime settings")
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .with_context(|| format!("Failed to expand settings path {}", raw))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let settings = RuntimeSettings::default();
        assert!(settings.pool.threads >= 1);
        assert_eq!(settings.backend, BackendKind::Pool);
        assert_eq!(settings.log_level, "info");
        settings.validate().unwrap();
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runtime.toml");

        fs::write(&path, r#"
backend = "thread"
log_level = "debug"

[pool]
threads = 3
"#).unwrap();

        let settings = RuntimeSettings::load(Some(&path)).unwrap();
        assert_eq!(settings.backend, BackendKind::Thread);
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.pool.threads, 3);
        assert_eq!(settings.pool.thread_name_prefix, defaults::pool::THREAD_NAME_PREFIX);
        assert_eq!(settings.worker.stack_size, defaults::worker::STACK_SIZE);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(RuntimeSettings::load(Some(&path)).is_err());
    }

    #[test]
    fn test_zero_threads_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runtime.toml");
        fs::write(&path, "[pool]\nthreads = 0\n").unwrap();

        let err = RuntimeSettings::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("pool.threads"));
    }

    #[test]
    fn test_toml_dump_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.toml");

        let mut settings = RuntimeSettings::default();
        settings.backend = BackendKind::Tokio;
        settings.pool.threads = 5;
        fs::write(&path, settings.to_toml().unwrap()).unwrap();

        let reloaded = RuntimeSettings::load(Some(&path)).unwrap();
        assert_eq!(reloaded.backend, BackendKind::Tokio);
        assert_eq!(reloaded.pool.threads, 5);
    }

    #[test]
    fn test_environment_override() {
        std::env::set_var("QUEUE_ACTORS__WORKER__THREAD_NAME_PREFIX", "env-worker");
        let settings = RuntimeSettings::load(None).unwrap();
        std::env::remove_var("QUEUE_ACTORS__WORKER__THREAD_NAME_PREFIX");

        assert_eq!(settings.worker.thread_name_prefix, "env-worker");
    }
}
