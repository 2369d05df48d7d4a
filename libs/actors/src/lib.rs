//! Queue-Bound Actor Runtime
//!
//! A small concurrency core: FIFO task queues over interchangeable execution
//! backends, objects whose every access is confined to one queue, and weak
//! handles that schedule work on those objects from any thread without
//! keeping them alive or racing their destruction.
//!
//! # Architecture
//!
//! ```text
//!  any thread                         bound context
//! ┌──────────────────┐   enqueue   ┌───────────────────────────────┐
//! │ ObjectOnQueue<T> │────────────▶│ TaskQueue  (FIFO, one wake)   │
//! │ WeakOnQueue<T>   │─resolve?───▶│   └─▶ Executor                │
//! │ Runner           │             │       thread | pool | tokio   │
//! └──────────────────┘             │       | main loop             │
//!          ▲                       └──────────────┬────────────────┘
//!          │ with_sync: Semaphore                  │ runs tasks on T
//!          └───────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use queue_actors::ObjectOnQueue;
//!
//! let counter = ObjectOnQueue::on_thread("counter", || 41)?;
//! counter.with(|value| *value += 1);
//! assert_eq!(counter.with_sync(|value| *value), 42);
//!
//! let weak = counter.weak();
//! drop(counter);
//! assert_eq!(weak.with_sync(|value| *value), None);
//! # Ok::<(), queue_actors::RuntimeError>(())
//! ```

pub mod error;
pub mod executor;
pub mod guard;
pub mod logging;
pub mod object;
pub mod producer;
pub mod queue;
pub mod runtime;
pub mod semaphore;
pub mod time;
pub mod weak;

pub use error::{Result, RuntimeError};
pub use executor::{Executor, Job, MainLoop, PoolExecutor, ThreadExecutor, TokioExecutor};
pub use guard::{guard, BinaryGuard, Guard};
pub use object::{Lifecycle, ObjectOnQueue};
pub use producer::{Event, Subscription};
pub use queue::{QueueId, QueueMetrics, QueueStats, TaskQueue};
pub use runtime::{Runtime, RuntimeMetrics, RuntimeStats};
pub use semaphore::Semaphore;
pub use time::{Clock, ProfileTime, SystemTimeSource, Time, TimeSource};
pub use weak::{Runner, WeakOnQueue};

pub use queue_config::{BackendKind, RuntimeSettings};
