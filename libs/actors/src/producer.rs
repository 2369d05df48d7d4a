//! Reactive Bridge
//!
//! Turns a method of an object on a queue that returns a
//! [`Stream`](futures::Stream) into a subscription delivered on another
//! context (usually a [`MainLoop`]).
//!
//! The stream is created, polled and dropped on the object's queue. Its waker
//! re-posts a poll task through a weak handle, so a stream never keeps its
//! object alive, and once the object is gone delivery simply stops.

use crate::executor::{Job, MainLoop};
use crate::object::ObjectOnQueue;
use crate::weak::WeakOnQueue;
use futures::task::{waker_ref, ArcWake};
use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::trace;

/// Items polled per task before yielding the queue to other work
const POLL_BUDGET: usize = 32;

/// What a consumer receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<V> {
    Next(V),
    /// The stream finished; nothing follows.
    Done,
}

/// Live producer connection; dropping it stops delivery
#[must_use = "dropping a Subscription stops delivery immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Stop delivery now. Equivalent to dropping the subscription.
    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

struct Pump<T: Send + 'static, S: Stream, C> {
    weak: WeakOnQueue<T>,
    stream: Mutex<Option<Pin<Box<S>>>>,
    scheduled: AtomicBool,
    cancelled: Arc<AtomicBool>,
    invoke: Arc<dyn Fn(Job) + Send + Sync>,
    consumer: Arc<Mutex<C>>,
}

impl<T, S, C> Pump<T, S, C>
where
    T: Send + 'static,
    S: Stream + Send + 'static,
    S::Item: Send + 'static,
    C: FnMut(Event<S::Item>) + Send + 'static,
{
    fn schedule(self: &Arc<Self>) {
        if self.scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        let pump = Arc::clone(self);
        self.weak.with(move |_| pump.poll());
    }

    fn deliver(&self, event: Event<S::Item>) {
        let consumer = Arc::clone(&self.consumer);
        let cancelled = Arc::clone(&self.cancelled);
        (self.invoke)(Box::new(move || {
            if !cancelled.load(Ordering::Acquire) {
                let mut consumer = consumer.lock();
                (*consumer)(event);
            }
        }));
    }

    /// Runs on the object's queue.
    fn poll(self: &Arc<Self>) {
        self.scheduled.store(false, Ordering::Release);

        // Polled outside the lock so a consumer running inline may cancel.
        let Some(mut stream) = self.stream.lock().take() else {
            return;
        };

        let waker = waker_ref(self);
        let mut cx = Context::from_waker(&waker);
        let mut budget = POLL_BUDGET;
        let finished = loop {
            if self.cancelled.load(Ordering::Acquire) {
                break true;
            }
            if budget == 0 {
                self.schedule();
                break false;
            }
            budget -= 1;
            match stream.as_mut().poll_next(&mut cx) {
                Poll::Ready(Some(item)) => self.deliver(Event::Next(item)),
                Poll::Ready(None) => {
                    self.deliver(Event::Done);
                    break true;
                }
                Poll::Pending => break false,
            }
        };

        if finished {
            trace!("Producer stream finished");
            drop(stream);
            return;
        }

        let mut slot = self.stream.lock();
        if self.cancelled.load(Ordering::Acquire) {
            drop(slot);
            drop(stream);
        } else {
            *slot = Some(stream);
        }
    }
}

impl<T, S, C> ArcWake for Pump<T, S, C>
where
    T: Send + 'static,
    S: Stream + Send + 'static,
    S::Item: Send + 'static,
    C: FnMut(Event<S::Item>) + Send + 'static,
{
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.schedule();
    }
}

impl<T: Send + 'static> WeakOnQueue<T> {
    /// Subscribe `consumer` to the stream returned by `method`.
    ///
    /// `method` runs on the object's queue; each item, then [`Event::Done`],
    /// is passed to `invoke` as a job that calls `consumer` in order. Nothing
    /// is delivered if the object is already gone.
    pub fn producer<S, M, I, C>(&self, method: M, invoke: I, consumer: C) -> Subscription
    where
        M: FnOnce(&mut T) -> S + Send + 'static,
        S: Stream + Send + 'static,
        S::Item: Send + 'static,
        I: Fn(Job) + Send + Sync + 'static,
        C: FnMut(Event<S::Item>) + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let pump = Arc::new(Pump {
            weak: self.clone(),
            stream: Mutex::new(None),
            // Held until the stream is installed and first polled.
            scheduled: AtomicBool::new(true),
            cancelled: Arc::clone(&cancelled),
            invoke: Arc::new(invoke),
            consumer: Arc::new(Mutex::new(consumer)),
        });

        let start = Arc::clone(&pump);
        self.with(move |value| {
            let stream = method(value);
            *start.stream.lock() = Some(Box::pin(stream));
            start.poll();
        });

        let weak = self.clone();
        Subscription {
            cancel: Some(Box::new(move || {
                cancelled.store(true, Ordering::Release);
                let stream = pump.stream.lock().take();
                if let Some(stream) = stream {
                    weak.destroy(stream);
                }
            })),
        }
    }

    /// [`producer`](Self::producer) delivering on `main`.
    pub fn producer_on_main<S, M, C>(&self, method: M, main: &MainLoop, consumer: C) -> Subscription
    where
        M: FnOnce(&mut T) -> S + Send + 'static,
        S: Stream + Send + 'static,
        S::Item: Send + 'static,
        C: FnMut(Event<S::Item>) + Send + 'static,
    {
        self.producer(method, main.invoker(), consumer)
    }
}

impl<T: Send + 'static> ObjectOnQueue<T> {
    pub fn producer<S, M, I, C>(&self, method: M, invoke: I, consumer: C) -> Subscription
    where
        M: FnOnce(&mut T) -> S + Send + 'static,
        S: Stream + Send + 'static,
        S::Item: Send + 'static,
        I: Fn(Job) + Send + Sync + 'static,
        C: FnMut(Event<S::Item>) + Send + 'static,
    {
        self.weak().producer(method, invoke, consumer)
    }

    pub fn producer_on_main<S, M, C>(&self, method: M, main: &MainLoop, consumer: C) -> Subscription
    where
        M: FnOnce(&mut T) -> S + Send + 'static,
        S: Stream + Send + 'static,
        S::Item: Send + 'static,
        C: FnMut(Event<S::Item>) + Send + 'static,
    {
        self.weak().producer_on_main(method, main, consumer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::TaskQueue;
    use futures::stream;
    use std::time::Duration;

    #[test]
    fn test_items_arrive_in_order_then_done() {
        let main = MainLoop::new();
        let object = ObjectOnQueue::on_thread("producer", || vec![1, 2, 3]).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = object.producer_on_main(
            |values: &mut Vec<i32>| stream::iter(values.clone()),
            &main,
            move |event| sink.lock().push(event),
        );

        let done = main.run_until(Duration::from_secs(5), || {
            seen.lock().last() == Some(&Event::Done)
        });
        assert!(done);
        assert_eq!(
            *seen.lock(),
            vec![Event::Next(1), Event::Next(2), Event::Next(3), Event::Done]
        );
    }

    #[test]
    fn test_long_stream_yields_between_budgets() {
        let main = MainLoop::new();
        let queue = TaskQueue::new(Arc::new(main.clone()));
        let object = ObjectOnQueue::new(queue, || ());

        let count = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&count);
        let _subscription = object.producer(
            |_| stream::iter(0..POLL_BUDGET * 3),
            |job: Job| job(),
            move |event| {
                if let Event::Next(_) = event {
                    *sink.lock() += 1;
                }
            },
        );

        main.run_pending();
        assert_eq!(*count.lock(), POLL_BUDGET * 3);
    }

    #[test]
    fn test_cancelled_subscription_stops_delivery() {
        let main = MainLoop::new();
        let object = ObjectOnQueue::on_thread("cancelled", || ()).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = object.producer_on_main(
            |_| stream::iter(0..4),
            &main,
            move |event| sink.lock().push(event),
        );
        object.with_sync(|_| ());

        // Items are posted to the main loop but not yet delivered.
        subscription.cancel();
        main.run_pending();
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_pending_stream_is_dropped_on_object_queue() {
        /// Never yields; records the dropping thread.
        struct Pending(Arc<Mutex<Option<std::thread::ThreadId>>>);
        impl Stream for Pending {
            type Item = ();
            fn poll_next(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Option<()>> {
                Poll::Pending
            }
        }
        impl Drop for Pending {
            fn drop(&mut self) {
                *self.0.lock() = Some(std::thread::current().id());
            }
        }

        let object = ObjectOnQueue::on_thread("drop-stream", || ()).unwrap();
        let worker = object.with_sync(|_| std::thread::current().id());
        let dropped_on = Arc::new(Mutex::new(None));

        let recorder = Arc::clone(&dropped_on);
        let subscription = object.producer(move |_| Pending(recorder), |job: Job| job(), |_event| {});
        object.with_sync(|_| ());
        assert!(dropped_on.lock().is_none());

        drop(subscription);
        object.with_sync(|_| ());
        assert_eq!(*dropped_on.lock(), Some(worker));
    }
}
