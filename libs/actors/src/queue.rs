//! Task Queue
//!
//! FIFO executor bound to one [`Executor`] backend. Any thread may enqueue;
//! tasks run one at a time, in the order their `enqueue` calls linearized
//! (insertion into the list), on whatever context the backend provides.
//!
//! # Wake Coalescing
//!
//! ```text
//! enqueue ─▶ push to list ─▶ CAS queued: false → true ─┬─ won  ─▶ executor.execute(drain)
//!                                                      └─ lost ─▶ a drain is already pending
//!
//! drain:  take whole list ─▶ run batch ─▶ repeat until empty
//!         queued = false
//!         list non-empty? ─▶ wake again (push raced the final check)
//! ```
//!
//! Exactly one drain is scheduled per idle→busy transition, the drain loop
//! never holds the list lock while a task runs, and a task that panics aborts
//! the process.

use crate::error::Result;
use crate::executor::{Executor, Job, ThreadExecutor};
use crate::semaphore::sync_slot;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace};
use uuid::Uuid;

/// Unique queue identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId {
    id: Uuid,
}

impl QueueId {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn uuid(&self) -> Uuid {
        self.id
    }
}

impl Default for QueueId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue-{}", self.id.simple())
    }
}

/// Per-queue counters
#[derive(Debug, Default)]
pub struct QueueMetrics {
    pub tasks_enqueued: AtomicU64,
    pub tasks_run: AtomicU64,
    /// Drain jobs handed to the executor (successful idle→busy CAS)
    pub wakes_scheduled: AtomicU64,
    /// Drain passes that actually started
    pub drains: AtomicU64,
}

/// Snapshot of [`QueueMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub tasks_enqueued: u64,
    pub tasks_run: u64,
    pub wakes_scheduled: u64,
    pub drains: u64,
    pub pending: usize,
}

/// Cloneable handle to a FIFO task queue
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    id: QueueId,
    list: Mutex<VecDeque<Job>>,
    /// Wake pending: set by the enqueuer that wins the CAS, cleared by drain
    queued: AtomicBool,
    executor: Arc<dyn Executor>,
    metrics: QueueMetrics,
}

impl TaskQueue {
    /// Create a queue draining on `executor`
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        let id = QueueId::new();
        debug!(queue_id = %id, backend = executor.name(), "Created task queue");
        Self {
            inner: Arc::new(QueueInner {
                id,
                list: Mutex::new(VecDeque::new()),
                queued: AtomicBool::new(false),
                executor,
                metrics: QueueMetrics::default(),
            }),
        }
    }

    /// Create a queue with its own dedicated worker thread
    pub fn on_thread(name: impl Into<String>) -> Result<Self> {
        let executor = ThreadExecutor::spawn(name)?;
        Ok(Self::new(Arc::new(executor)))
    }

    pub fn id(&self) -> QueueId {
        self.inner.id
    }

    /// Name of the backend this queue drains on
    pub fn backend(&self) -> &'static str {
        self.inner.executor.name()
    }

    /// Append `task` to the tail of the queue. Non-blocking, callable from
    /// any thread including tasks running on this queue.
    pub fn enqueue(&self, task: impl FnOnce() + Send + 'static) {
        self.enqueue_boxed(Box::new(task));
    }

    pub(crate) fn enqueue_boxed(&self, task: Job) {
        self.inner.list.lock().push_back(task);
        self.inner.metrics.tasks_enqueued.fetch_add(1, Ordering::Relaxed);
        QueueInner::schedule_wake(&self.inner);
    }

    /// Run `f` on the queue and block until it has returned.
    ///
    /// Must not be called from a task running on this same queue: the caller
    /// would wait for a task queued behind itself.
    ///
    /// # Panics
    ///
    /// Panics if the backend discards the task without running it, which
    /// only happens when the backend itself has been shut down.
    pub fn sync<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (slot, completion) = sync_slot();
        self.enqueue(move || completion.complete(f()));
        match slot.wait() {
            Some(value) => value,
            None => panic!("{} discarded a synchronous task without running it", self.id()),
        }
    }

    /// Counter snapshot
    pub fn stats(&self) -> QueueStats {
        let metrics = &self.inner.metrics;
        QueueStats {
            tasks_enqueued: metrics.tasks_enqueued.load(Ordering::Relaxed),
            tasks_run: metrics.tasks_run.load(Ordering::Relaxed),
            wakes_scheduled: metrics.wakes_scheduled.load(Ordering::Relaxed),
            drains: metrics.drains.load(Ordering::Relaxed),
            pending: self.inner.list.lock().len(),
        }
    }

    /// True if both handles refer to the same queue
    pub fn same_queue(&self, other: &TaskQueue) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl QueueInner {
    fn schedule_wake(this: &Arc<Self>) {
        if this
            .queued
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        this.metrics.wakes_scheduled.fetch_add(1, Ordering::Relaxed);

        let queue = Arc::clone(this);
        this.executor.execute(Box::new(move || queue.drain()));
    }

    fn drain(self: Arc<Self>) {
        self.metrics.drains.fetch_add(1, Ordering::Relaxed);

        let mut ran = 0usize;
        loop {
            let batch = std::mem::take(&mut *self.list.lock());
            if batch.is_empty() {
                break;
            }
            for task in batch {
                let _abort = AbortOnPanic::new(&self.id);
                task();
                self.metrics.tasks_run.fetch_add(1, Ordering::Relaxed);
                ran += 1;
            }
        }
        trace!(queue_id = %self.id, tasks = ran, "Drain pass finished");

        self.queued.store(false, Ordering::SeqCst);
        if !self.list.lock().is_empty() {
            Self::schedule_wake(&self);
        }
    }
}

/// Aborts the process if dropped while a task is unwinding.
pub(crate) struct AbortOnPanic<'a> {
    context: &'a dyn fmt::Display,
}

impl<'a> AbortOnPanic<'a> {
    pub(crate) fn new(context: &'a dyn fmt::Display) -> Self {
        Self { context }
    }
}

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!(context = %self.context, "Task panicked, aborting");
            std::process::abort();
        }
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("id", &self.inner.id)
            .field("backend", &self.inner.executor.name())
            .field("queued", &self.inner.queued.load(Ordering::Relaxed))
            .finish()
    }
}
