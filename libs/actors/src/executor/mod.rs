//! Execution Backends
//!
//! A [`TaskQueue`](crate::queue::TaskQueue) never runs tasks itself. When it
//! goes from idle to busy it hands one drain job to its [`Executor`], which
//! runs the job on whatever execution context it owns.
//!
//! ```text
//! ┌────────────┐  enqueue   ┌───────────┐  execute(drain)  ┌──────────────────┐
//! │ producers  │──────────▶ │ TaskQueue │ ───────────────▶ │ Executor         │
//! │ (any thr.) │            │  FIFO +   │  once per        │  ThreadExecutor  │
//! └────────────┘            │  wake CAS │  idle→busy       │  PoolExecutor    │
//!                           └───────────┘                  │  TokioExecutor   │
//!                                                          │  MainLoop        │
//!                                                          └──────────────────┘
//! ```
//!
//! All backends share one contract: jobs are never run inline inside
//! `execute`, and every submitted job eventually runs exactly once unless the
//! backend itself is gone.

mod dispatch;
mod main_loop;
mod pool;
mod thread;

pub use dispatch::TokioExecutor;
pub use main_loop::MainLoop;
pub use pool::PoolExecutor;
pub use thread::ThreadExecutor;

/// Type-erased unit of work handed to a backend
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Execution substrate underlying a task queue
pub trait Executor: Send + Sync + 'static {
    /// Submit a job. Non-blocking; must not run the job on the caller's stack.
    fn execute(&self, job: Job);

    /// Backend name for structured logs
    fn name(&self) -> &'static str;
}
