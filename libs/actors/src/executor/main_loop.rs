//! Main loop backend: jobs run only when the owning thread pumps the loop.
//!
//! This is the run-loop integration point. A host event loop installs a
//! notifier that wakes it when work arrives, then calls
//! [`MainLoop::run_pending`] from its own thread.

use super::{Executor, Job};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

type Notifier = Arc<dyn Fn() + Send + Sync>;

/// Cloneable handle to a pumped job list
#[derive(Clone, Default)]
pub struct MainLoop {
    inner: Arc<MainLoopInner>,
}

#[derive(Default)]
struct MainLoopInner {
    jobs: Mutex<VecDeque<Job>>,
    posted: Condvar,
    notifier: Mutex<Option<Notifier>>,
}

impl MainLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a callback invoked (on the posting thread) after every post
    pub fn set_notifier(&self, notifier: impl Fn() + Send + Sync + 'static) {
        *self.inner.notifier.lock() = Some(Arc::new(notifier));
    }

    /// Queue `job` for the next pump
    pub fn post(&self, job: impl FnOnce() + Send + 'static) {
        self.push(Box::new(job));
    }

    fn push(&self, job: Job) {
        self.inner.jobs.lock().push_back(job);
        self.inner.posted.notify_all();

        let notifier = self.inner.notifier.lock().clone();
        if let Some(notify) = notifier {
            notify();
        }
    }

    /// Number of jobs waiting for a pump
    pub fn pending(&self) -> usize {
        self.inner.jobs.lock().len()
    }

    /// Run jobs on the calling thread until none are left, including jobs
    /// posted while running. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let batch = std::mem::take(&mut *self.inner.jobs.lock());
            if batch.is_empty() {
                return ran;
            }
            for job in batch {
                job();
                ran += 1;
            }
        }
    }

    /// Pump until `done()` holds or `timeout` elapses, sleeping while idle.
    /// Returns the final value of `done()`.
    pub fn run_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_pending();
            if done() {
                return true;
            }

            let mut jobs = self.inner.jobs.lock();
            if jobs.is_empty() && self.inner.posted.wait_until(&mut jobs, deadline).timed_out() {
                drop(jobs);
                self.run_pending();
                return done();
            }
        }
    }

    /// Adapter that posts any job to this loop
    pub fn invoker(&self) -> impl Fn(Job) + Send + Sync + Clone + 'static {
        let main = self.clone();
        move |job| main.push(job)
    }
}

impl Executor for MainLoop {
    fn execute(&self, job: Job) {
        self.push(job);
    }

    fn name(&self) -> &'static str {
        "main_loop"
    }
}

impl std::fmt::Debug for MainLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainLoop")
            .field("pending", &self.pending())
            .finish()
    }
}
