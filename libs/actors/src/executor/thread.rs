//! Dedicated worker thread backend.

use super::{Executor, Job};
use crate::error::{Result, RuntimeError};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, trace};

/// One OS thread parked on a condition variable, running submitted jobs in
/// submission order.
pub struct ThreadExecutor {
    shared: Arc<ThreadShared>,
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
    name: String,
}

struct ThreadShared {
    jobs: Mutex<VecDeque<Job>>,
    available: Condvar,
    shutdown: AtomicBool,
}

impl ThreadExecutor {
    /// Spawn a worker thread with the platform default stack size
    pub fn spawn(name: impl Into<String>) -> Result<Self> {
        Self::spawn_with(name, None)
    }

    /// Spawn a worker thread, optionally with an explicit stack size
    pub fn spawn_with(name: impl Into<String>, stack_size: Option<usize>) -> Result<Self> {
        let name = name.into();
        let shared = Arc::new(ThreadShared {
            jobs: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });

        let mut builder = thread::Builder::new().name(name.clone());
        if let Some(stack_size) = stack_size {
            builder = builder.stack_size(stack_size);
        }

        let worker_shared = Arc::clone(&shared);
        let handle = builder
            .spawn(move || run(worker_shared))
            .map_err(|e| RuntimeError::spawn(name.clone(), e))?;

        debug!(thread_name = %name, backend = "thread", "Spawned dedicated queue thread");

        Ok(Self {
            shared,
            thread_id: handle.thread().id(),
            thread: Some(handle),
            name,
        })
    }

    /// Identity of the worker thread every job runs on
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn thread_name(&self) -> &str {
        &self.name
    }
}

fn run(shared: Arc<ThreadShared>) {
    loop {
        let job = {
            let mut jobs = shared.jobs.lock();
            loop {
                if let Some(job) = jobs.pop_front() {
                    break Some(job);
                }
                if shared.shutdown.load(Ordering::Acquire) {
                    break None;
                }
                shared.available.wait(&mut jobs);
            }
        };

        match job {
            Some(job) => job(),
            None => break,
        }
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, job: Job) {
        self.shared.jobs.lock().push_back(job);
        self.shared.available.notify_one();
    }

    fn name(&self) -> &'static str {
        "thread"
    }
}

impl Drop for ThreadExecutor {
    fn drop(&mut self) {
        {
            let _jobs = self.shared.jobs.lock();
            self.shared.shutdown.store(true, Ordering::Release);
        }
        self.shared.available.notify_one();

        let Some(handle) = self.thread.take() else {
            return;
        };
        if thread::current().id() == self.thread_id {
            // Dropped from one of our own jobs: the loop exits after it returns.
            trace!(thread_name = %self.name, "Detaching queue thread from itself");
            return;
        }
        if handle.join().is_err() {
            tracing::error!(thread_name = %self.name, "Queue thread terminated by panic");
        }
        debug!(thread_name = %self.name, "Dedicated queue thread stopped");
    }
}

impl std::fmt::Debug for ThreadExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadExecutor")
            .field("name", &self.name)
            .field("pending_jobs", &self.shared.jobs.lock().len())
            .finish()
    }
}
