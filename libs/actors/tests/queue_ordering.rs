//! Queue Ordering Tests
//!
//! FIFO and wake-coalescing properties of task queues on every backend.

use parking_lot::Mutex;
use proptest::prelude::*;
use queue_actors::{MainLoop, PoolExecutor, TaskQueue, TokioExecutor};
use std::sync::Arc;
use std::thread;

fn pool_queue() -> TaskQueue {
    TaskQueue::new(Arc::new(PoolExecutor::new(4, "ordering-pool").unwrap()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_single_submitter_order_is_preserved(batches in prop::collection::vec(
        prop::collection::vec(any::<u16>(), 0..64),
        1..16,
    )) {
        let queue = pool_queue();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for batch in &batches {
            for &value in batch {
                let seen = Arc::clone(&seen);
                queue.enqueue(move || seen.lock().push(value));
            }
            // Let the queue go idle between some batches.
            if batch.len() % 2 == 0 {
                queue.sync(|| ());
            }
        }
        queue.sync(|| ());

        let expected: Vec<u16> = batches.concat();
        prop_assert_eq!(&*seen.lock(), &expected);
    }
}

#[test]
fn test_per_submitter_order_under_contention() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 2_000;

    let queue = pool_queue();
    let seen = Arc::new(Mutex::new(Vec::with_capacity(THREADS * PER_THREAD)));

    thread::scope(|scope| {
        for submitter in 0..THREADS {
            let queue = queue.clone();
            let seen = Arc::clone(&seen);
            scope.spawn(move || {
                for seq in 0..PER_THREAD {
                    let seen = Arc::clone(&seen);
                    queue.enqueue(move || seen.lock().push((submitter, seq)));
                }
            });
        }
    });
    queue.sync(|| ());

    let seen = seen.lock();
    assert_eq!(seen.len(), THREADS * PER_THREAD);
    let mut next = [0usize; THREADS];
    for &(submitter, seq) in seen.iter() {
        assert_eq!(seq, next[submitter], "submitter {} out of order", submitter);
        next[submitter] += 1;
    }
}

#[test]
fn test_one_wake_per_idle_to_busy_transition() {
    let main = MainLoop::new();
    let queue = TaskQueue::new(Arc::new(main.clone()));

    for round in 1..=5u64 {
        thread::scope(|scope| {
            for _ in 0..4 {
                let queue = queue.clone();
                scope.spawn(move || {
                    for _ in 0..100 {
                        queue.enqueue(|| {});
                    }
                });
            }
        });
        assert_eq!(main.pending(), 1, "round {}", round);
        main.run_pending();

        let stats = queue.stats();
        assert_eq!(stats.wakes_scheduled, round);
        assert_eq!(stats.drains, round);
        assert_eq!(stats.tasks_run, round * 400);
        assert_eq!(stats.pending, 0);
    }
}

#[test]
fn test_thread_queue_runs_on_one_thread() {
    let queue = TaskQueue::on_thread("ordering-thread").unwrap();
    let worker = queue.sync(|| thread::current().id());
    let others = Arc::new(Mutex::new(Vec::new()));

    for _ in 0..500 {
        let others = Arc::clone(&others);
        queue.enqueue(move || {
            let id = thread::current().id();
            if id != worker {
                others.lock().push(id);
            }
        });
    }
    queue.sync(|| ());
    assert!(others.lock().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_queue_preserves_order() {
    let queue = TaskQueue::new(Arc::new(TokioExecutor::current().unwrap()));
    let seen = Arc::new(Mutex::new(Vec::new()));

    for value in 0..1_000u32 {
        let seen = Arc::clone(&seen);
        queue.enqueue(move || seen.lock().push(value));
    }

    let barrier = queue.clone();
    tokio::task::spawn_blocking(move || barrier.sync(|| ()))
        .await
        .unwrap();

    assert_eq!(*seen.lock(), (0..1_000).collect::<Vec<_>>());
    assert_eq!(queue.backend(), "tokio");
}
