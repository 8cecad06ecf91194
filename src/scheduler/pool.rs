use std::time::{Duration, Instant};

use futures::executor::ThreadPool;
use once_cell::sync::Lazy;

use super::{Scheduler, TaskHandle};

static SHARED_POOL: Lazy<ThreadPool> = Lazy::new(|| {
  ThreadPool::new().expect("failed to spawn the shared scheduler pool")
});

/// Wall-clock scheduler backed by a futures thread pool; delays are async
/// sleeps, so a parked timer occupies no pool thread.
#[derive(Clone)]
pub struct PoolScheduler {
  pool: ThreadPool,
}

impl PoolScheduler {
  /// The process-wide shared pool.
  pub fn shared() -> Self { Self { pool: SHARED_POOL.clone() } }

  /// A scheduler over a caller-supplied pool.
  pub fn from_pool(pool: ThreadPool) -> Self { Self { pool } }
}

impl Scheduler for PoolScheduler {
  fn schedule<F>(&self, delay: Duration, task: F) -> TaskHandle
  where
    F: FnOnce() + Send + 'static,
  {
    let handle = TaskHandle::new();
    let checked = handle.clone();
    self.pool.spawn_ok(async move {
      if !delay.is_zero() {
        futures_time::task::sleep(delay.into()).await;
      }
      if !checked.is_cancelled() {
        task();
      }
    });
    handle
  }

  #[inline]
  fn now(&self) -> Instant { Instant::now() }
}
