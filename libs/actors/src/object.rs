//! Object on Queue
//!
//! [`ObjectOnQueue<T>`] owns a value of type `T` that lives on one
//! [`TaskQueue`]. The value is built, mutated and dropped only by tasks on
//! that queue, so `T` needs no locking of its own.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ─▶ Constructing ─▶ Live ─▶ Destroying ─▶ Gone
//!       │               │           │          │
//!    new()        first task    with/with_sync  last task (queued by
//!                 on queue      bodies run      dropping the handle)
//! ```
//!
//! Every transition is exactly one task on the bound queue. Dropping the
//! handle from any thread only *schedules* destruction, so `T::drop` runs on
//! the same context as all of its mutators.
//!
//! # Teardown vs. Weak Handles
//!
//! Scheduling through a [`WeakOnQueue`] and tearing down are serialized by a
//! per-object gate: a weak handle either enqueues its task before the
//! destruction task (and the task then runs against a live value) or observes
//! the object as released and does nothing.

use crate::error::Result;
use crate::queue::TaskQueue;
use crate::semaphore::sync_slot;
use crate::weak::{Runner, WeakOnQueue};
use parking_lot::{RwLock, RwLockReadGuard};
use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Actor state machine, advanced only by tasks on the bound queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    Uninitialized = 0,
    Constructing = 1,
    Live = 2,
    Destroying = 3,
    Gone = 4,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Uninitialized,
            1 => Self::Constructing,
            2 => Self::Live,
            3 => Self::Destroying,
            _ => Self::Gone,
        }
    }
}

/// Shared storage behind strong and weak handles
pub(crate) struct ObjectData<T> {
    queue: TaskQueue,
    state: AtomicU8,
    /// `true` once the owning handle has been dropped
    released: RwLock<bool>,
    value: UnsafeCell<Option<T>>,
}

// SAFETY: `value` is only touched by tasks on `queue`, which never runs two
// tasks at once and orders consecutive tasks through its list lock.
unsafe impl<T: Send> Send for ObjectData<T> {}
unsafe impl<T: Send> Sync for ObjectData<T> {}

impl<T: Send + 'static> ObjectData<T> {
    fn new(queue: TaskQueue) -> Arc<Self> {
        Arc::new(Self {
            queue,
            state: AtomicU8::new(Lifecycle::Uninitialized as u8),
            released: RwLock::new(false),
            value: UnsafeCell::new(None),
        })
    }

    pub(crate) fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_lifecycle(&self, state: Lifecycle) {
        trace!(queue_id = %self.queue.id(), state = ?state, "Object lifecycle transition");
        self.state.store(state as u8, Ordering::Release);
    }

    /// Gate held by weak handles while they enqueue; `None` once released.
    pub(crate) fn admit(&self) -> Option<RwLockReadGuard<'_, bool>> {
        let released = self.released.read();
        if *released {
            None
        } else {
            Some(released)
        }
    }

    /// # Safety
    ///
    /// Must only be called from a task running on `self.queue`.
    #[allow(clippy::mut_from_ref)]
    unsafe fn value_mut(&self) -> Option<&mut T> {
        (*self.value.get()).as_mut()
    }

    fn construct(self: &Arc<Self>, init: impl FnOnce() -> T + Send + 'static) {
        let data = Arc::clone(self);
        self.queue.enqueue(move || {
            data.set_lifecycle(Lifecycle::Constructing);
            let value = init();
            // SAFETY: running on the bound queue.
            unsafe { *data.value.get() = Some(value) };
            data.set_lifecycle(Lifecycle::Live);
        });
    }

    pub(crate) fn with(self: &Arc<Self>, method: impl FnOnce(&mut T) + Send + 'static) {
        let data = Arc::clone(self);
        self.queue.enqueue(move || {
            debug_assert_eq!(data.lifecycle(), Lifecycle::Live);
            // SAFETY: running on the bound queue.
            match unsafe { data.value_mut() } {
                Some(value) => method(value),
                None => trace!(queue_id = %data.queue.id(), "Skipping task for object that is not live"),
            }
        });
    }

    /// Enqueue `method` and return a waiter for its result. The waiter must
    /// only be blocked on after any admission guard has been released.
    pub(crate) fn with_sync<R, F>(self: &Arc<Self>, method: F) -> impl FnOnce() -> Option<R>
    where
        F: FnOnce(&mut T) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (slot, completion) = sync_slot();
        self.with(move |value| completion.complete(method(value)));
        move || slot.wait()
    }

    pub(crate) fn destroy<V: Send + 'static>(&self, value: V) {
        self.queue.enqueue(move || drop(value));
    }

    /// Mark released and schedule destruction of the value.
    fn teardown(self: &Arc<Self>) {
        // Every admitted weak handle has already enqueued by the time the
        // write lock is granted, so the destroy task still queues last. The
        // lock must not be held across `enqueue`: backends may run user
        // notifiers that query this object.
        *self.released.write() = true;

        let data = Arc::clone(self);
        self.queue.enqueue(move || {
            data.set_lifecycle(Lifecycle::Destroying);
            // SAFETY: running on the bound queue.
            let value = unsafe { (*data.value.get()).take() };
            drop(value);
            data.set_lifecycle(Lifecycle::Gone);
        });
    }
}

/// Owning handle to a value confined to a task queue
pub struct ObjectOnQueue<T: Send + 'static> {
    data: Arc<ObjectData<T>>,
}

impl<T: Send + 'static> ObjectOnQueue<T> {
    /// Bind a new object to `queue`; `init` runs as the queue's next task.
    pub fn new(queue: TaskQueue, init: impl FnOnce() -> T + Send + 'static) -> Self {
        let data = ObjectData::new(queue);
        data.construct(init);
        Self { data }
    }

    /// Like [`new`](Self::new), but `init` receives a weak handle to the
    /// object being built, so `T` can hand out callbacks to itself. Work
    /// scheduled through that handle runs after construction finishes.
    pub fn new_cyclic(
        queue: TaskQueue,
        init: impl FnOnce(WeakOnQueue<T>) -> T + Send + 'static,
    ) -> Self {
        let data = ObjectData::new(queue);
        let weak = WeakOnQueue::from_data(&data);
        data.construct(move || init(weak));
        Self { data }
    }

    /// Bind a new object to a queue with its own dedicated thread
    pub fn on_thread(
        name: impl Into<String>,
        init: impl FnOnce() -> T + Send + 'static,
    ) -> Result<Self> {
        Ok(Self::new(TaskQueue::on_thread(name)?, init))
    }

    /// Schedule `method` on the object; returns immediately.
    pub fn with(&self, method: impl FnOnce(&mut T) + Send + 'static) {
        self.data.with(method);
    }

    /// Run `method` on the object and block until it returns its result.
    ///
    /// Must not be called from a task on the object's own queue.
    ///
    /// # Panics
    ///
    /// Panics if the queue's backend discards the task without running it.
    pub fn with_sync<R, F>(&self, method: F) -> R
    where
        F: FnOnce(&mut T) -> R + Send + 'static,
        R: Send + 'static,
    {
        let wait = self.data.with_sync(method);
        match wait() {
            Some(value) => value,
            None => panic!(
                "{} discarded a synchronous task without running it",
                self.data.queue().id()
            ),
        }
    }

    /// Drop `value` on the object's queue
    pub fn destroy<V: Send + 'static>(&self, value: V) {
        self.data.destroy(value);
    }

    pub fn weak(&self) -> WeakOnQueue<T> {
        WeakOnQueue::from_data(&self.data)
    }

    /// Type-erased "post to this object's queue" adapter
    pub fn runner(&self) -> Runner {
        self.weak().runner()
    }

    pub fn queue(&self) -> &TaskQueue {
        self.data.queue()
    }

    /// Current lifecycle state; for diagnostics only, it may change right after
    pub fn lifecycle(&self) -> Lifecycle {
        self.data.lifecycle()
    }
}

impl<T: Send + 'static> Drop for ObjectOnQueue<T> {
    fn drop(&mut self) {
        self.data.teardown();
    }
}

impl<T: Send + 'static> fmt::Debug for ObjectOnQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectOnQueue")
            .field("type", &std::any::type_name::<T>())
            .field("queue", &self.data.queue().id())
            .field("lifecycle", &self.data.lifecycle())
            .finish()
    }
}
