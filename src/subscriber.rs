//! Subscriber: the value-consuming half of the protocol.
//!
//! A subscriber is attached to exactly one subscription at a time. It first
//! receives the subscription, then at most the granted demand's worth of
//! values, then exactly one terminal completion. The demand returned from
//! [`Subscriber::receive`] adds to the outstanding total, so a consumer can
//! keep a pipeline flowing without ever touching the subscription again.

use std::marker::PhantomData;

use crate::demand::Demand;
use crate::error::{self, ProtocolViolation};
use crate::subscription::{BoxSubscription, Subscription};
use crate::sync::Lock;

/// How a stream ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion<F> {
  Finished,
  Failed(F),
}

impl<F> Completion<F> {
  #[inline]
  pub fn is_failure(&self) -> bool { matches!(self, Completion::Failed(_)) }
}

pub trait Subscriber {
  type Input: Send + 'static;
  type Failure: Send + 'static;

  /// Hands over the subscription. Called exactly once, before any value.
  fn receive_subscription(&mut self, subscription: BoxSubscription);

  /// Delivers one value; the returned demand is granted immediately and
  /// adds to the outstanding total.
  fn receive(&mut self, input: Self::Input) -> Demand;

  /// Delivers the terminal event. Nothing is delivered afterwards.
  fn receive_completion(&mut self, completion: Completion<Self::Failure>);
}

/// The erased form used across type-erasure seams.
pub type BoxSubscriber<T, F> =
  Box<dyn Subscriber<Input = T, Failure = F> + Send>;

impl<S: Subscriber + ?Sized> Subscriber for Box<S> {
  type Input = S::Input;
  type Failure = S::Failure;

  #[inline]
  fn receive_subscription(&mut self, subscription: BoxSubscription) {
    (**self).receive_subscription(subscription)
  }

  #[inline]
  fn receive(&mut self, input: Self::Input) -> Demand {
    (**self).receive(input)
  }

  #[inline]
  fn receive_completion(&mut self, completion: Completion<Self::Failure>) {
    (**self).receive_completion(completion)
  }
}

/// Handle returned by [`sink`](crate::publisher::PublisherExt::sink); lets
/// the caller cancel the pipeline from outside.
pub struct SinkHandle {
  inner: Lock<SinkHandleInner>,
}

struct SinkHandleInner {
  closed: bool,
  subscription: Option<BoxSubscription>,
}

impl SinkHandle {
  pub(crate) fn new() -> Self {
    Self {
      inner: Lock::new(SinkHandleInner { closed: false, subscription: None }),
    }
  }

  /// Activates RAII behavior: the pipeline is cancelled as soon as the
  /// returned guard goes out of scope.
  #[inline]
  pub fn cancel_when_dropped(self) -> crate::subscription::SubscriptionGuard<Self> {
    crate::subscription::SubscriptionGuard::new(self)
  }

  fn attach(&self, subscription: BoxSubscription) {
    let rejected = {
      let mut inner = self.inner.lock();
      if inner.closed {
        Some(subscription)
      } else if inner.subscription.is_some() {
        error::report(ProtocolViolation::DuplicateSubscription);
        Some(subscription)
      } else {
        inner.subscription = Some(subscription);
        None
      }
    };
    if let Some(mut subscription) = rejected {
      subscription.cancel();
    } else {
      let mut handle = Self { inner: self.inner.clone() };
      handle.request(Demand::unbounded());
    }
  }

  fn close(&self) {
    let mut inner = self.inner.lock();
    inner.closed = true;
    inner.subscription = None;
  }
}

impl Clone for SinkHandle {
  #[inline]
  fn clone(&self) -> Self { Self { inner: self.inner.clone() } }
}

impl Subscription for SinkHandle {
  fn request(&mut self, demand: Demand) {
    // check the subscription out so a synchronous delivery burst can
    // re-enter this handle without deadlocking
    let mut subscription = {
      let mut inner = self.inner.lock();
      if inner.closed || demand.is_none() {
        return;
      }
      match inner.subscription.take() {
        Some(s) => s,
        None => return,
      }
    };
    subscription.request(demand);
    let mut inner = self.inner.lock();
    if !inner.closed && inner.subscription.is_none() {
      inner.subscription = Some(subscription);
    }
  }

  fn cancel(&mut self) {
    let subscription = {
      let mut inner = self.inner.lock();
      if inner.closed {
        return;
      }
      inner.closed = true;
      inner.subscription.take()
    };
    if let Some(mut s) = subscription {
      s.cancel();
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.inner.lock().closed }
}

/// Closure-backed terminal subscriber with unbounded demand.
pub struct Sink<T, F, N, C> {
  next: N,
  completion: C,
  handle: SinkHandle,
  attached: bool,
  _marker: PhantomData<fn(T, F)>,
}

impl<T, F, N, C> Sink<T, F, N, C> {
  pub(crate) fn new(next: N, completion: C, handle: SinkHandle) -> Self {
    Self { next, completion, handle, attached: false, _marker: PhantomData }
  }
}

impl<T, F, N, C> Subscriber for Sink<T, F, N, C>
where
  T: Send + 'static,
  F: Send + 'static,
  N: FnMut(T),
  C: FnMut(Completion<F>),
{
  type Input = T;
  type Failure = F;

  fn receive_subscription(&mut self, subscription: BoxSubscription) {
    self.attached = true;
    self.handle.attach(subscription);
  }

  fn receive(&mut self, input: T) -> Demand {
    if !self.attached {
      error::report(ProtocolViolation::MissingSubscription);
      return Demand::none();
    }
    (self.next)(input);
    Demand::none()
  }

  fn receive_completion(&mut self, completion: Completion<F>) {
    if !self.attached {
      error::report(ProtocolViolation::MissingSubscription);
      return;
    }
    self.handle.close();
    (self.completion)(completion);
  }
}
