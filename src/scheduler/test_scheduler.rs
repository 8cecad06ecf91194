//! Deterministic virtual-time scheduler for testing time-gated pipelines.

use std::time::{Duration, Instant};

use super::{Scheduler, TaskHandle};
use crate::sync::Lock;

/// A scheduler whose clock only moves when the test advances it. Tasks run
/// on the advancing thread, in due-time order (insertion order breaking
/// ties), with the virtual clock set to each task's due time as it runs.
#[derive(Clone)]
pub struct TestScheduler {
  inner: Lock<TestInner>,
}

struct TestInner {
  origin: Instant,
  elapsed: Duration,
  next_seq: u64,
  tasks: Vec<Scheduled>,
}

struct Scheduled {
  due: Duration,
  seq: u64,
  handle: TaskHandle,
  task: Box<dyn FnOnce() + Send>,
}

impl TestScheduler {
  pub fn new() -> Self {
    Self {
      inner: Lock::new(TestInner {
        origin: Instant::now(),
        elapsed: Duration::ZERO,
        next_seq: 0,
        tasks: Vec::new(),
      }),
    }
  }

  /// Moves the clock forward by `duration`, running every due task.
  pub fn advance(&self, duration: Duration) {
    let target = self.inner.lock().elapsed + duration;
    self.advance_to(target);
  }

  /// Moves the clock to `target` elapsed time (no-op if already past it).
  pub fn advance_to(&self, target: Duration) {
    loop {
      let task = {
        let mut inner = self.inner.lock();
        if target <= inner.elapsed {
          return;
        }
        inner.tasks.retain(|t| !t.handle.is_cancelled());
        let next = inner
          .tasks
          .iter()
          .enumerate()
          .filter(|(_, t)| t.due <= target)
          .min_by_key(|(_, t)| (t.due, t.seq))
          .map(|(i, _)| i);
        match next {
          Some(i) => {
            let scheduled = inner.tasks.swap_remove(i);
            inner.elapsed = inner.elapsed.max(scheduled.due);
            scheduled
          }
          None => {
            inner.elapsed = target;
            return;
          }
        }
      };
      if !task.handle.is_cancelled() {
        (task.task)();
      }
    }
  }

  /// Elapsed virtual time since the scheduler was created.
  pub fn elapsed(&self) -> Duration { self.inner.lock().elapsed }

  /// Number of not-yet-run, not-cancelled tasks.
  pub fn pending_tasks(&self) -> usize {
    self
      .inner
      .lock()
      .tasks
      .iter()
      .filter(|t| !t.handle.is_cancelled())
      .count()
  }
}

impl Default for TestScheduler {
  #[inline]
  fn default() -> Self { Self::new() }
}

impl Scheduler for TestScheduler {
  fn schedule<F>(&self, delay: Duration, task: F) -> TaskHandle
  where
    F: FnOnce() + Send + 'static,
  {
    let handle = TaskHandle::new();
    let mut inner = self.inner.lock();
    let due = inner.elapsed + delay;
    inner.next_seq += 1;
    let seq = inner.next_seq;
    inner.tasks.push(Scheduled {
      due,
      seq,
      handle: handle.clone(),
      task: Box::new(task),
    });
    handle
  }

  fn now(&self) -> Instant {
    let inner = self.inner.lock();
    inner.origin + inner.elapsed
  }
}
