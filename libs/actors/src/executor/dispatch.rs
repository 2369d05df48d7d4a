//! Asynchronous dispatch backend on a Tokio runtime.
//!
//! Drain jobs go to the runtime's blocking pool: tasks are synchronous and a
//! `with_sync` inside one may park the thread, which must never stall the
//! async workers.

use super::{Executor, Job};
use crate::error::{Result, RuntimeError};
use tokio::runtime::Handle;
use tracing::debug;

/// Submits drain jobs to a Tokio runtime's blocking pool
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    pub fn new(handle: Handle) -> Self {
        debug!(backend = "tokio", "Created Tokio dispatch backend");
        Self { handle }
    }

    /// Bind to the runtime the caller is running inside
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| RuntimeError::NoAsyncRuntime)
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, job: Job) {
        // Detached; a runtime that is shutting down drops the job.
        drop(self.handle.spawn_blocking(job));
    }

    fn name(&self) -> &'static str {
        "tokio"
    }
}
