//! The stateful link between one publisher and one subscriber.
//!
//! A subscription carries demand upstream and cancellation in either
//! direction. Cancellation is idempotent: cancelling twice is observably the
//! same as cancelling once, and requesting demand after cancellation is a
//! no-op.

use smallvec::SmallVec;

use crate::demand::Demand;
use crate::sync::Lock;

pub trait Subscription {
  /// Grants further demand. Demand accumulates; it never replaces the
  /// outstanding total. Requesting `Demand::none()` is a legal no-op, as is
  /// requesting after cancellation.
  fn request(&mut self, demand: Demand);

  /// Stops future deliveries and releases resources held by this link.
  /// Safe to call repeatedly and concurrently with an in-flight delivery:
  /// the delivery in progress may finish, but no new one starts.
  fn cancel(&mut self);

  fn is_closed(&self) -> bool;
}

/// The erased form every subscriber receives.
pub type BoxSubscription = Box<dyn Subscription + Send>;

impl<T: Subscription + ?Sized> Subscription for Box<T> {
  #[inline]
  fn request(&mut self, demand: Demand) { (**self).request(demand) }

  #[inline]
  fn cancel(&mut self) { (**self).cancel() }

  #[inline]
  fn is_closed(&self) -> bool { (**self).is_closed() }
}

/// Subscription handed out by publishers that terminate synchronously during
/// `subscribe` and therefore never honor demand.
#[derive(Clone, Copy, Debug, Default)]
pub struct InertSubscription;

impl Subscription for InertSubscription {
  fn request(&mut self, _demand: Demand) {}

  fn cancel(&mut self) {}

  fn is_closed(&self) -> bool { true }
}

/// A cancellation fan-out: one handle cancelling a set of upstream links.
///
/// Stateful operators keep their upstream subscriptions (and timer handles)
/// here so that one downstream `cancel` releases everything. Links added
/// after cancellation are cancelled on the spot.
pub struct Teardown {
  inner: Lock<TeardownInner>,
}

struct TeardownInner {
  closed: bool,
  links: SmallVec<[BoxSubscription; 2]>,
}

impl Teardown {
  pub fn new() -> Self {
    Self {
      inner: Lock::new(TeardownInner { closed: false, links: SmallVec::new() }),
    }
  }

  pub fn add(&self, mut link: BoxSubscription) {
    let closed = {
      let mut inner = self.inner.lock();
      if !inner.closed {
        inner.links.retain(|l| !l.is_closed());
        inner.links.push(link);
        return;
      }
      inner.closed
    };
    if closed {
      link.cancel();
    }
  }

  pub fn cancel(&self) {
    let links = {
      let mut inner = self.inner.lock();
      if inner.closed {
        return;
      }
      inner.closed = true;
      std::mem::take(&mut inner.links)
    };
    // cancel outside the lock: links may re-enter arbitrary stage state
    for mut link in links {
      link.cancel();
    }
  }

  pub fn is_closed(&self) -> bool { self.inner.lock().closed }
}

impl Clone for Teardown {
  #[inline]
  fn clone(&self) -> Self { Self { inner: self.inner.clone() } }
}

impl Default for Teardown {
  #[inline]
  fn default() -> Self { Self::new() }
}

impl Subscription for Teardown {
  fn request(&mut self, _demand: Demand) {}

  #[inline]
  fn cancel(&mut self) { Teardown::cancel(self) }

  #[inline]
  fn is_closed(&self) -> bool { Teardown::is_closed(self) }
}

/// RAII wrapper cancelling the held subscription on drop.
///
/// If the value is not bound to a variable it is dropped, and therefore
/// cancelled, immediately.
#[must_use]
pub struct SubscriptionGuard<T: Subscription>(pub T);

impl<T: Subscription> SubscriptionGuard<T> {
  #[inline]
  pub fn new(subscription: T) -> Self { Self(subscription) }
}

impl<T: Subscription> Drop for SubscriptionGuard<T> {
  #[inline]
  fn drop(&mut self) { self.0.cancel() }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Probe {
    cancelled: Lock<usize>,
  }

  impl Subscription for Probe {
    fn request(&mut self, _demand: Demand) {}

    fn cancel(&mut self) { *self.cancelled.lock() += 1; }

    fn is_closed(&self) -> bool { *self.cancelled.lock() > 0 }
  }

  #[test]
  fn teardown_cancels_every_link_once() {
    let count = Lock::new(0);
    let teardown = Teardown::new();
    teardown.add(Box::new(Probe { cancelled: count.clone() }));
    teardown.add(Box::new(Probe { cancelled: count.clone() }));

    teardown.cancel();
    teardown.cancel();
    assert_eq!(*count.lock(), 2);
  }

  #[test]
  fn late_link_is_cancelled_on_add() {
    let count = Lock::new(0);
    let teardown = Teardown::new();
    teardown.cancel();
    teardown.add(Box::new(Probe { cancelled: count.clone() }));
    assert_eq!(*count.lock(), 1);
  }

  #[test]
  fn guard_cancels_on_drop() {
    let count = Lock::new(0);
    {
      let _guard =
        SubscriptionGuard::new(Probe { cancelled: count.clone() });
    }
    assert_eq!(*count.lock(), 1);
  }
}
