//! Publisher: a composable description of an asynchronous value source.
//!
//! Publishers own no running state; every `subscribe` call materializes a
//! fresh per-subscription state machine. Pipelines compose structurally:
//! each operator wraps its upstream and encodes it in its type, so the hot
//! per-value path is static dispatch, with `BoxPublisher` available at the
//! seams that need erasure.

use std::time::Duration;

use crate::ops::combine_latest::CombineLatest;
use crate::ops::debounce::Debounce;
use crate::ops::filter::Filter;
use crate::ops::flat_map::FlatMap;
use crate::ops::map::Map;
use crate::ops::retry::{Retry, RetryLimit};
use crate::ops::throttle::{Throttle, ThrottleMode};
use crate::ops::zip::Zip;
use crate::scheduler::Scheduler;
use crate::source::{from_iter, Iter};
use crate::subscriber::{
  BoxSubscriber, Completion, Sink, SinkHandle, Subscriber,
};

pub trait Publisher {
  type Output: Send + 'static;
  type Failure: Send + 'static;

  /// Attaches `subscriber` to this publisher. The subscriber synchronously
  /// receives its subscription; values flow only as demand is granted.
  fn subscribe<S>(self, subscriber: S)
  where
    S: Subscriber<Input = Self::Output, Failure = Self::Failure>
      + Send
      + 'static;
}

/// Operator constructors, available on every publisher.
pub trait PublisherExt: Publisher + Sized {
  fn map<F, Out>(self, f: F) -> Map<Self, F>
  where
    F: FnMut(Self::Output) -> Out,
  {
    Map { source: self, f }
  }

  fn filter<F>(self, predicate: F) -> Filter<Self, F>
  where
    F: FnMut(&Self::Output) -> bool,
  {
    Filter { source: self, predicate }
  }

  /// Emits the combination of the latest value from both upstreams every
  /// time either emits. Completes once both complete; fails as soon as
  /// either fails, cancelling the sibling.
  ///
  /// `binary_op` runs inside the operator's critical section and must not
  /// feed either upstream.
  fn combine_latest<B, F, Out>(self, other: B, binary_op: F) -> CombineLatest<Self, B, F>
  where
    B: Publisher<Failure = Self::Failure>,
    F: FnMut(Self::Output, B::Output) -> Out,
  {
    CombineLatest { a: self, b: other, binary_op }
  }

  /// Pairs the n-th value of both upstreams in strict lockstep.
  fn zip<B>(self, other: B) -> Zip<Self, B>
  where
    B: Publisher<Failure = Self::Failure>,
  {
    Zip { a: self, b: other }
  }

  /// Maps every upstream value to an inner publisher and funnels all inner
  /// values into one stream, interleaved in arrival order. Use
  /// [`FlatMap::concurrency`] to bound the number of live inner
  /// subscriptions.
  fn flat_map<F, Inner>(self, f: F) -> FlatMap<Self, F>
  where
    F: FnMut(Self::Output) -> Inner,
    Inner: Publisher<Failure = Self::Failure>,
  {
    FlatMap::new(self, f)
  }

  /// Flattens a publisher of publishers.
  fn flatten(self) -> FlatMap<Self, fn(Self::Output) -> Self::Output>
  where
    Self::Output: Publisher<Failure = Self::Failure>,
  {
    FlatMap::new(self, std::convert::identity)
  }

  /// Interleaves this publisher with `other` in arrival order.
  fn merge<B>(
    self,
    other: B,
  ) -> FlatMap<
    Iter<Vec<BoxPublisher<Self::Output, Self::Failure>>, Self::Failure>,
    fn(
      BoxPublisher<Self::Output, Self::Failure>,
    ) -> BoxPublisher<Self::Output, Self::Failure>,
  >
  where
    Self: Send + 'static,
    B: Publisher<Output = Self::Output, Failure = Self::Failure>
      + Send
      + 'static,
  {
    from_iter(vec![self.boxed(), other.boxed()]).flatten()
  }

  /// Emits the most recent upstream value once `interval` has elapsed
  /// without a newer one. Completion flushes a pending value immediately.
  fn debounce<SD>(self, interval: Duration, scheduler: SD) -> Debounce<Self, SD>
  where
    SD: Scheduler,
  {
    Debounce { source: self, interval, scheduler }
  }

  /// Emits at most one value per `interval`; `mode` picks the first or the
  /// latest value seen in each window.
  fn throttle<SD>(
    self,
    interval: Duration,
    mode: ThrottleMode,
    scheduler: SD,
  ) -> Throttle<Self, SD>
  where
    SD: Scheduler,
  {
    Throttle { source: self, interval, mode, scheduler }
  }

  /// Resubscribes to a fresh copy of this publisher on failure, up to
  /// `limit` attempts; downstream demand carries over between attempts.
  fn retry(self, limit: impl Into<RetryLimit>) -> Retry<Self>
  where
    Self: Clone,
  {
    Retry { source: self, limit: limit.into() }
  }

  /// Erases the concrete pipeline type.
  fn boxed(self) -> BoxPublisher<Self::Output, Self::Failure>
  where
    Self: Send + 'static,
  {
    BoxPublisher(Box::new(self))
  }

  /// Subscribes with unbounded demand, ignoring the terminal event.
  fn sink<N>(self, next: N) -> SinkHandle
  where
    N: FnMut(Self::Output) + Send + 'static,
  {
    self.sink_with(next, |_| {})
  }

  /// Subscribes with unbounded demand and a terminal-event callback.
  fn sink_with<N, C>(self, next: N, completion: C) -> SinkHandle
  where
    N: FnMut(Self::Output) + Send + 'static,
    C: FnMut(Completion<Self::Failure>) + Send + 'static,
  {
    let handle = SinkHandle::new();
    self.subscribe(Sink::new(next, completion, handle.clone()));
    handle
  }
}

impl<P: Publisher> PublisherExt for P {}

trait DynPublisher {
  type Output: Send + 'static;
  type Failure: Send + 'static;

  fn box_subscribe(
    self: Box<Self>,
    subscriber: BoxSubscriber<Self::Output, Self::Failure>,
  );
}

impl<P: Publisher> DynPublisher for P {
  type Output = P::Output;
  type Failure = P::Failure;

  fn box_subscribe(
    self: Box<Self>,
    subscriber: BoxSubscriber<Self::Output, Self::Failure>,
  ) {
    (*self).subscribe(subscriber)
  }
}

/// A type-erased publisher.
pub struct BoxPublisher<T, F>(
  Box<dyn DynPublisher<Output = T, Failure = F> + Send>,
);

impl<T, F> Publisher for BoxPublisher<T, F>
where
  T: Send + 'static,
  F: Send + 'static,
{
  type Output = T;
  type Failure = F;

  fn subscribe<S>(self, subscriber: S)
  where
    S: Subscriber<Input = T, Failure = F> + Send + 'static,
  {
    self.0.box_subscribe(Box::new(subscriber))
  }
}
