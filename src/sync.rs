use std::sync::{Arc, Mutex, MutexGuard};

/// Shared mutable state guarded by a mutex. Every stateful stage owns exactly
/// one of these; it is the stage's mutual-exclusion domain.
pub(crate) struct Lock<T>(Arc<Mutex<T>>);

impl<T> Lock<T> {
  #[inline]
  pub fn new(value: T) -> Self { Self(Arc::new(Mutex::new(value))) }

  #[inline]
  pub fn lock(&self) -> MutexGuard<'_, T> { self.0.lock().unwrap() }
}

impl<T> Clone for Lock<T> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}
