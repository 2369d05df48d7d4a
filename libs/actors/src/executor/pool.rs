//! Shared thread pool backend.
//!
//! Every wake of a pool-backed queue is a fresh submission: the drain job
//! borrows whichever worker picks it up and gives it back when the queue is
//! empty again. Many queues share the same workers; per-queue ordering comes
//! from the queue, not from the pool.

use super::{Executor, Job};
use crate::error::{Result, RuntimeError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use queue_config::PoolSettings;
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, error};

/// Fixed-size pool of worker threads fed by an unbounded channel
pub struct PoolExecutor {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    prefix: String,
}

impl PoolExecutor {
    /// Spawn `threads` workers named `<prefix>-<index>`
    pub fn new(threads: usize, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        if threads == 0 {
            return Err(RuntimeError::configuration(
                "thread pool needs at least one worker",
                Some("pool.threads"),
            ));
        }

        let (sender, receiver) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let name = format!("{}-{}", prefix, index);
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || work(receiver))
                .map_err(|e| RuntimeError::spawn(name, e))?;
            workers.push(handle);
        }

        debug!(threads, prefix = %prefix, backend = "pool", "Started shared thread pool");

        Ok(Self {
            sender: Some(sender),
            workers,
            prefix,
        })
    }

    pub fn from_settings(settings: &PoolSettings) -> Result<Self> {
        Self::new(settings.threads, settings.thread_name_prefix.clone())
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Thread identities of all workers
    pub fn thread_ids(&self) -> Vec<ThreadId> {
        self.workers.iter().map(|w| w.thread().id()).collect()
    }
}

fn work(receiver: Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        job();
    }
}

impl Executor for PoolExecutor {
    fn execute(&self, job: Job) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(job).is_err() {
            error!(prefix = %self.prefix, "Thread pool has no live workers, job dropped");
        }
    }

    fn name(&self) -> &'static str {
        "pool"
    }
}

impl Drop for PoolExecutor {
    fn drop(&mut self) {
        // Disconnect: workers finish queued jobs, then exit.
        self.sender.take();

        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                error!(prefix = %self.prefix, "Pool worker terminated by panic");
            }
        }
        debug!(prefix = %self.prefix, "Shared thread pool stopped");
    }
}

impl std::fmt::Debug for PoolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolExecutor")
            .field("prefix", &self.prefix)
            .field("threads", &self.workers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_zero_threads_rejected() {
        let err = PoolExecutor::new(0, "empty").unwrap_err();
        assert_eq!(err.category(), "configuration");
    }

    #[test]
    fn test_jobs_spread_over_workers() {
        let pool = PoolExecutor::new(4, "spread").unwrap();
        assert_eq!(pool.threads(), 4);

        let counter = Arc::new(AtomicUsize::new(0));
        let threads = Arc::new(Mutex::new(HashSet::new()));
        for _ in 0..1_000 {
            let counter = Arc::clone(&counter);
            let threads = Arc::clone(&threads);
            pool.execute(Box::new(move || {
                threads.lock().unwrap().insert(thread::current().id());
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        let workers: HashSet<_> = pool.thread_ids().into_iter().collect();
        drop(pool);

        assert_eq!(counter.load(Ordering::SeqCst), 1_000);
        assert!(threads.lock().unwrap().is_subset(&workers));
    }

    #[test]
    fn test_worker_names_use_prefix() {
        let pool = PoolExecutor::new(1, "named-pool").unwrap();
        let name = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&name);
        pool.execute(Box::new(move || {
            *slot.lock().unwrap() = thread::current().name().map(str::to_string);
        }));
        drop(pool);

        assert_eq!(name.lock().unwrap().as_deref(), Some("named-pool-0"));
    }
}
