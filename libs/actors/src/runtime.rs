//! Runtime
//!
//! Explicitly owned home for the shared execution resources: one thread pool,
//! one main loop, the settings they were built from, and counters describing
//! what was created through them. There is no process-wide instance; create a
//! [`Runtime`] and pass it by reference.
//!
//! # Dispatch Surfaces
//!
//! | Call | Runs on | Ordering |
//! |------|---------|----------|
//! | [`spawn`](Runtime::spawn) | shared pool | none |
//! | [`sync`](Runtime::sync) | shared pool | caller blocks |
//! | [`on_main`](Runtime::on_main) | main loop | FIFO |
//! | [`queue`](Runtime::queue) | configured backend | FIFO per queue |

use crate::error::{Result, RuntimeError};
use crate::executor::{Executor, MainLoop, PoolExecutor, ThreadExecutor, TokioExecutor};
use crate::guard::{guard, Guard};
use crate::object::ObjectOnQueue;
use crate::queue::{AbortOnPanic, TaskQueue};
use crate::semaphore::sync_slot;
use queue_config::{BackendKind, RuntimeSettings};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info};
use uuid::Uuid;

/// Counters for everything created or dispatched through a runtime
#[derive(Debug, Default)]
pub struct RuntimeMetrics {
    pub queues_created: AtomicU64,
    pub objects_created: AtomicU64,
    pub tasks_spawned: AtomicU64,
    pub sync_calls: AtomicU64,
    pub main_posts: AtomicU64,
}

impl RuntimeMetrics {
    pub fn snapshot(&self) -> RuntimeStats {
        RuntimeStats {
            queues_created: self.queues_created.load(Ordering::Relaxed),
            objects_created: self.objects_created.load(Ordering::Relaxed),
            tasks_spawned: self.tasks_spawned.load(Ordering::Relaxed),
            sync_calls: self.sync_calls.load(Ordering::Relaxed),
            main_posts: self.main_posts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RuntimeMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeStats {
    pub queues_created: u64,
    pub objects_created: u64,
    pub tasks_spawned: u64,
    pub sync_calls: u64,
    pub main_posts: u64,
}

/// Owner of the shared pool and main loop
pub struct Runtime {
    runtime_id: String,
    settings: RuntimeSettings,
    pool: Arc<PoolExecutor>,
    main: MainLoop,
    /// Captured at creation for the Tokio dispatch backend
    tokio: Option<Handle>,
    /// Next index for default-backend worker thread names
    next_worker: AtomicU64,
    metrics: Arc<RuntimeMetrics>,
}

impl Runtime {
    /// Runtime with default settings
    pub fn new() -> Result<Self> {
        Self::with_settings(RuntimeSettings::default())
    }

    /// Load settings from an optional TOML file plus `QUEUE_ACTORS__*`
    /// environment overrides.
    pub fn from_config(path: Option<&Path>) -> Result<Self> {
        let settings = RuntimeSettings::load(path)?;
        Self::with_settings(settings)
    }

    pub fn with_settings(settings: RuntimeSettings) -> Result<Self> {
        settings.validate()?;

        let tokio = Handle::try_current().ok();
        if settings.backend == BackendKind::Tokio && tokio.is_none() {
            return Err(RuntimeError::NoAsyncRuntime);
        }

        let pool = Arc::new(PoolExecutor::from_settings(&settings.pool)?);
        let runtime_id = format!("runtime-{}", Uuid::new_v4().simple());

        info!(
            runtime_id = %runtime_id,
            backend = ?settings.backend,
            pool_threads = pool.threads(),
            "Created queue runtime"
        );

        Ok(Self {
            runtime_id,
            settings,
            pool,
            main: MainLoop::new(),
            tokio,
            next_worker: AtomicU64::new(0),
            metrics: Arc::new(RuntimeMetrics::default()),
        })
    }

    pub fn id(&self) -> &str {
        &self.runtime_id
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn main_loop(&self) -> &MainLoop {
        &self.main
    }

    pub fn pool(&self) -> &Arc<PoolExecutor> {
        &self.pool
    }

    pub fn metrics(&self) -> Arc<RuntimeMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn stats(&self) -> RuntimeStats {
        self.metrics.snapshot()
    }

    /// Run `f` on the shared pool with no ordering guarantee.
    pub fn spawn(&self, f: impl FnOnce() + Send + 'static) {
        self.metrics.tasks_spawned.fetch_add(1, Ordering::Relaxed);
        let context = self.runtime_id.clone();
        self.pool.execute(Box::new(move || {
            let _abort = AbortOnPanic::new(&context);
            f();
        }));
    }

    /// Run `f` on the shared pool and block until it returns.
    ///
    /// # Panics
    ///
    /// Panics if the pool drops the job without running it.
    pub fn sync<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.metrics.sync_calls.fetch_add(1, Ordering::Relaxed);
        let (slot, completion) = sync_slot();
        self.spawn(move || completion.complete(f()));
        match slot.wait() {
            Some(value) => value,
            None => panic!("{} pool discarded a synchronous task", self.runtime_id),
        }
    }

    /// Post `f` to the main loop.
    pub fn on_main(&self, f: impl FnOnce() + Send + 'static) {
        self.metrics.main_posts.fetch_add(1, Ordering::Relaxed);
        self.main.post(f);
    }

    /// Post `f` to the main loop; it is skipped if `guard` has died by then.
    pub fn on_main_guarded<G: Guard>(&self, guard_token: G, f: impl FnOnce() + Send + 'static) {
        self.on_main(guard(guard_token, f));
    }

    /// New queue on the configured default backend
    pub fn queue(&self) -> Result<TaskQueue> {
        match self.settings.backend {
            BackendKind::Pool => Ok(self.pool_queue()),
            BackendKind::Thread => {
                let index = self.next_worker.fetch_add(1, Ordering::Relaxed);
                self.thread_queue(format!(
                    "{}-{}",
                    self.settings.worker.thread_name_prefix, index
                ))
            }
            BackendKind::Tokio => self.tokio_queue(),
        }
    }

    /// New queue sharing the runtime's pool
    pub fn pool_queue(&self) -> TaskQueue {
        self.register(TaskQueue::new(self.pool.clone()))
    }

    /// New queue with its own worker thread
    pub fn thread_queue(&self, name: impl Into<String>) -> Result<TaskQueue> {
        let executor = ThreadExecutor::spawn_with(name, Some(self.settings.worker.stack_size))?;
        Ok(self.register(TaskQueue::new(Arc::new(executor))))
    }

    /// New queue dispatching onto the Tokio blocking pool
    pub fn tokio_queue(&self) -> Result<TaskQueue> {
        let executor = match &self.tokio {
            Some(handle) => TokioExecutor::new(handle.clone()),
            None => TokioExecutor::current()?,
        };
        Ok(self.register(TaskQueue::new(Arc::new(executor))))
    }

    fn register(&self, queue: TaskQueue) -> TaskQueue {
        self.metrics.queues_created.fetch_add(1, Ordering::Relaxed);
        debug!(runtime_id = %self.runtime_id, queue_id = %queue.id(), backend = queue.backend(), "Registered queue");
        queue
    }

    /// Object on a new queue of the default backend
    pub fn object_on_queue<T: Send + 'static>(
        &self,
        init: impl FnOnce() -> T + Send + 'static,
    ) -> Result<ObjectOnQueue<T>> {
        let queue = self.queue()?;
        self.metrics.objects_created.fetch_add(1, Ordering::Relaxed);
        Ok(ObjectOnQueue::new(queue, init))
    }

    /// Object on a new dedicated worker thread named `name`
    pub fn object_on_thread<T: Send + 'static>(
        &self,
        name: impl Into<String>,
        init: impl FnOnce() -> T + Send + 'static,
    ) -> Result<ObjectOnQueue<T>> {
        let queue = self.thread_queue(name)?;
        self.metrics.objects_created.fetch_add(1, Ordering::Relaxed);
        Ok(ObjectOnQueue::new(queue, init))
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        let stats = self.metrics.snapshot();
        info!(
            runtime_id = %self.runtime_id,
            queues = stats.queues_created,
            objects = stats.objects_created,
            pending_main = self.main.pending(),
            "Queue runtime shutting down"
        );
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.runtime_id)
            .field("backend", &self.settings.backend)
            .field("pool", &self.pool)
            .finish()
    }
}
