//! Counting semaphore used as the completion gate for synchronous dispatch.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// Blocking counter: `acquire` waits for a positive count, `release` adds one.
#[derive(Debug, Default)]
pub struct Semaphore {
    count: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    /// Create a semaphore with a zero count
    pub fn new() -> Self {
        Self::with_count(0)
    }

    pub fn with_count(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            available: Condvar::new(),
        }
    }

    /// Block until the count is positive, then decrement it.
    pub fn acquire(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.available.wait(&mut count);
        }
        *count -= 1;
    }

    /// Increment the count and wake at most one waiter. Never blocks for
    /// longer than the internal lock is held.
    pub fn release(&self) {
        let mut count = self.count.lock();
        *count += 1;
        drop(count);
        self.available.notify_one();
    }
}

/// Result slot shared between a blocked caller and the task it waits for
pub(crate) struct SyncSlot<R> {
    value: Mutex<Option<R>>,
    done: Semaphore,
}

/// Task-side half of a [`SyncSlot`]. Releases the waiter when dropped, so a
/// task that is discarded without running still unblocks the caller.
pub(crate) struct Completion<R> {
    slot: Arc<SyncSlot<R>>,
}

/// Create a waiter/completion pair for one synchronous round trip
pub(crate) fn sync_slot<R>() -> (Arc<SyncSlot<R>>, Completion<R>) {
    let slot = Arc::new(SyncSlot {
        value: Mutex::new(None),
        done: Semaphore::new(),
    });
    let completion = Completion {
        slot: Arc::clone(&slot),
    };
    (slot, completion)
}

impl<R> SyncSlot<R> {
    /// Block until the completion is dropped; `None` if no value was stored
    pub(crate) fn wait(&self) -> Option<R> {
        self.done.acquire();
        self.value.lock().take()
    }
}

impl<R> Completion<R> {
    pub(crate) fn complete(self, value: R) {
        *self.slot.value.lock() = Some(value);
    }
}

impl<R> Drop for Completion<R> {
    fn drop(&mut self) {
        self.slot.done.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_release_before_acquire() {
        let semaphore = Semaphore::new();
        semaphore.release();
        semaphore.acquire();
    }

    #[test]
    fn test_acquire_blocks_until_release() {
        let semaphore = Arc::new(Semaphore::new());
        let released = Arc::new(AtomicBool::new(false));

        let releaser = {
            let semaphore = Arc::clone(&semaphore);
            let released = Arc::clone(&released);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                released.store(true, Ordering::SeqCst);
                semaphore.release();
            })
        };

        semaphore.acquire();
        assert!(released.load(Ordering::SeqCst));
        releaser.join().unwrap();
    }

    #[test]
    fn test_wake_latency_is_bounded() {
        let semaphore = Arc::new(Semaphore::new());
        let waiter = {
            let semaphore = Arc::clone(&semaphore);
            thread::spawn(move || {
                semaphore.acquire();
                Instant::now()
            })
        };

        thread::sleep(Duration::from_millis(10));
        let released_at = Instant::now();
        semaphore.release();
        let woke_at = waiter.join().unwrap();

        assert!(woke_at.duration_since(released_at) < Duration::from_secs(1));
    }

    #[test]
    fn test_sync_slot_round_trip() {
        let (slot, completion) = sync_slot();
        let worker = thread::spawn(move || completion.complete(42));
        assert_eq!(slot.wait(), Some(42));
        worker.join().unwrap();
    }

    #[test]
    fn test_dropped_completion_unblocks_waiter() {
        let (slot, completion) = sync_slot::<u32>();
        let worker = thread::spawn(move || drop(completion));
        assert_eq!(slot.wait(), None);
        worker.join().unwrap();
    }

    #[test]
    fn test_counts_accumulate() {
        let semaphore = Arc::new(Semaphore::with_count(2));
        semaphore.acquire();
        semaphore.acquire();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let semaphore = Arc::clone(&semaphore);
                thread::spawn(move || semaphore.acquire())
            })
            .collect();
        for _ in 0..4 {
            semaphore.release();
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
