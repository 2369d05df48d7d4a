//! Weak Handles
//!
//! A [`WeakOnQueue<T>`] schedules work on an object without keeping it alive.
//! Every operation first resolves the handle; once the owning
//! [`ObjectOnQueue`](crate::ObjectOnQueue) is gone, operations become no-ops
//! (or return `None` for [`WeakOnQueue::with_sync`]).

use crate::executor::{Job, MainLoop};
use crate::object::{Lifecycle, ObjectData};
use crate::queue::TaskQueue;
use std::fmt;
use std::sync::{Arc, Weak};

/// Non-owning handle to an object on a queue
pub struct WeakOnQueue<T: Send + 'static> {
    data: Weak<ObjectData<T>>,
}

impl<T: Send + 'static> WeakOnQueue<T> {
    pub(crate) fn from_data(data: &Arc<ObjectData<T>>) -> Self {
        Self {
            data: Arc::downgrade(data),
        }
    }

    /// Run `schedule` while the object is guaranteed not to be torn down.
    /// Returns `false` when the handle no longer resolves.
    fn schedule(&self, schedule: impl FnOnce(&Arc<ObjectData<T>>)) -> bool {
        let Some(data) = self.data.upgrade() else {
            return false;
        };
        let Some(_admitted) = data.admit() else {
            return false;
        };
        schedule(&data);
        true
    }

    /// Schedule `method` if the object still exists; otherwise do nothing.
    pub fn with(&self, method: impl FnOnce(&mut T) + Send + 'static) {
        self.schedule(|data| data.with(method));
    }

    /// Run `method` and wait for its result, or return `None` at once if the
    /// object is gone. A resolved object stays alive until `method` returns.
    ///
    /// Must not be called from a task on the object's own queue.
    pub fn with_sync<R, F>(&self, method: F) -> Option<R>
    where
        F: FnOnce(&mut T) -> R + Send + 'static,
        R: Send + 'static,
    {
        let mut wait = None;
        self.schedule(|data| wait = Some(data.with_sync(method)));
        // Blocking happens after the admission guard is released.
        wait.and_then(|wait| wait())
    }

    /// Drop `value` on the object's queue, or right here if the object is gone.
    pub fn destroy<V: Send + 'static>(&self, value: V) {
        self.schedule(move |data| data.destroy(value));
    }

    /// Whether the owning handle is still held
    pub fn is_alive(&self) -> bool {
        match self.data.upgrade() {
            Some(data) => {
                let admitted = data.admit().is_some();
                admitted
            }
            None => false,
        }
    }

    /// Lifecycle of the object, or `None` once its storage is released
    pub fn lifecycle(&self) -> Option<Lifecycle> {
        self.data.upgrade().map(|data| data.lifecycle())
    }

    /// Queue the object is bound to, while it still exists
    pub fn queue(&self) -> Option<TaskQueue> {
        self.data.upgrade().map(|data| data.queue().clone())
    }

    /// Adapter that runs jobs on this object's queue while it is alive
    pub fn runner(&self) -> Runner {
        let weak = self.clone();
        Runner::new(move |job| weak.with(move |_| job()))
    }
}

impl<T: Send + 'static> Clone for WeakOnQueue<T> {
    fn clone(&self) -> Self {
        Self {
            data: Weak::clone(&self.data),
        }
    }
}

/// An unbound handle that never resolves
impl<T: Send + 'static> Default for WeakOnQueue<T> {
    fn default() -> Self {
        Self { data: Weak::new() }
    }
}

impl<T: Send + 'static> fmt::Debug for WeakOnQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakOnQueue")
            .field("type", &std::any::type_name::<T>())
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Type-erased "run this somewhere" function
///
/// Lets callback-style code target an object's queue, a plain queue or the
/// main loop without knowing which.
#[derive(Clone)]
pub struct Runner {
    post: Arc<dyn Fn(Job) + Send + Sync>,
}

impl Runner {
    pub fn new(post: impl Fn(Job) + Send + Sync + 'static) -> Self {
        Self {
            post: Arc::new(post),
        }
    }

    pub fn run(&self, job: impl FnOnce() + Send + 'static) {
        (self.post)(Box::new(job));
    }
}

impl From<TaskQueue> for Runner {
    fn from(queue: TaskQueue) -> Self {
        Runner::new(move |job| queue.enqueue_boxed(job))
    }
}

impl From<&MainLoop> for Runner {
    fn from(main: &MainLoop) -> Self {
        Runner::new(main.invoker())
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner").finish_non_exhaustive()
    }
}
