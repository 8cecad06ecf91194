//! The execution-context contract consumed by time-gated operators.
//!
//! The core never spawns concurrency of its own; it only asks a scheduler to
//! run a task at or after a point in time and keeps the returned handle so a
//! cancelled pipeline can kill pending timers. Callbacks from the same
//! scheduler for the same operator are serialized by the operator itself,
//! so schedulers owe no ordering guarantee beyond "not before the delay".

mod test_scheduler;
pub use test_scheduler::TestScheduler;

#[cfg(feature = "pool-scheduler")]
mod pool;
#[cfg(feature = "pool-scheduler")]
pub use pool::PoolScheduler;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
pub use std::time::{Duration, Instant};

use crate::demand::Demand;
use crate::subscription::Subscription;

pub trait Scheduler: Clone + Send + 'static {
  /// Schedules `task` to run once, at or after `delay` from now. The
  /// returned handle cancels the task if it has not run yet.
  fn schedule<F>(&self, delay: Duration, task: F) -> TaskHandle
  where
    F: FnOnce() + Send + 'static;

  fn now(&self) -> Instant;
}

/// Cancellable handle to one scheduled task. Scheduler implementations must
/// check [`TaskHandle::is_cancelled`] immediately before running the task.
#[derive(Clone, Debug)]
pub struct TaskHandle {
  cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
  pub fn new() -> Self { Self { cancelled: Arc::new(AtomicBool::new(false)) } }

  #[inline]
  pub fn cancel(&self) { self.cancelled.store(true, Ordering::Release); }

  #[inline]
  pub fn is_cancelled(&self) -> bool { self.cancelled.load(Ordering::Acquire) }
}

impl Default for TaskHandle {
  #[inline]
  fn default() -> Self { Self::new() }
}

impl Subscription for TaskHandle {
  fn request(&mut self, _demand: Demand) {}

  #[inline]
  fn cancel(&mut self) { TaskHandle::cancel(self) }

  #[inline]
  fn is_closed(&self) -> bool { self.is_cancelled() }
}
