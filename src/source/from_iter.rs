//! Pull-on-demand iterator source.

use std::iter::Peekable;
use std::marker::PhantomData;

use crate::demand::Demand;
use crate::publisher::Publisher;
use crate::subscriber::{Completion, Subscriber};
use crate::subscription::Subscription;
use crate::sync::Lock;

/// Creates a publisher that pulls values from `iter` as demand arrives and
/// completes when the iterator is exhausted. It never fails; the failure
/// type is free so the source composes with any pipeline.
pub fn from_iter<I, F>(iter: I) -> Iter<I, F>
where
  I: IntoIterator,
{
  Iter { iter, _failure: PhantomData }
}

/// Publisher emitting exactly one value.
pub fn just<T, F>(value: T) -> Iter<std::iter::Once<T>, F> {
  from_iter(std::iter::once(value))
}

/// Publisher completing immediately without a value.
pub fn empty<T, F>() -> Iter<std::iter::Empty<T>, F> {
  from_iter(std::iter::empty())
}

pub struct Iter<I, F> {
  iter: I,
  _failure: PhantomData<fn() -> F>,
}

impl<I: Clone, F> Clone for Iter<I, F> {
  fn clone(&self) -> Self {
    Self { iter: self.iter.clone(), _failure: PhantomData }
  }
}

impl<I, F> Publisher for Iter<I, F>
where
  I: IntoIterator,
  I::Item: Send + 'static,
  I::IntoIter: Send + 'static,
  F: Send + 'static,
{
  type Output = I::Item;
  type Failure = F;

  fn subscribe<S>(self, mut subscriber: S)
  where
    S: Subscriber<Input = I::Item, Failure = F> + Send + 'static,
  {
    let state = Lock::new(IterState {
      iter: self.iter.into_iter().peekable(),
      downstream: None,
      demand: Demand::none(),
      emitting: false,
      closed: false,
    });
    subscriber
      .receive_subscription(Box::new(IterSubscription { state: state.clone() }));
    {
      let mut s = state.lock();
      if s.closed {
        return;
      }
      s.downstream = Some(subscriber);
    }
    drain(&state);
  }
}

struct IterState<It: Iterator, S> {
  iter: Peekable<It>,
  downstream: Option<S>,
  demand: Demand,
  emitting: bool,
  closed: bool,
}

struct IterSubscription<It: Iterator, S> {
  state: Lock<IterState<It, S>>,
}

impl<It, S> Subscription for IterSubscription<It, S>
where
  It: Iterator<Item = S::Input> + Send + 'static,
  S: Subscriber + Send + 'static,
{
  fn request(&mut self, demand: Demand) {
    if demand.is_none() {
      return;
    }
    {
      let mut s = self.state.lock();
      if s.closed {
        return;
      }
      s.demand += demand;
    }
    drain(&self.state);
  }

  fn cancel(&mut self) {
    let mut s = self.state.lock();
    s.closed = true;
    s.downstream = None;
  }

  fn is_closed(&self) -> bool { self.state.lock().closed }
}

fn drain<It, S>(state: &Lock<IterState<It, S>>)
where
  It: Iterator<Item = S::Input>,
  S: Subscriber,
{
  let mut s = state.lock();
  if s.emitting || s.closed {
    return;
  }
  s.emitting = true;
  loop {
    if s.closed {
      break;
    }
    if s.iter.peek().is_none() {
      // exhausted: complete, but only once the subscriber is attached
      let mut downstream = match s.downstream.take() {
        Some(d) => d,
        None => break,
      };
      s.closed = true;
      drop(s);
      downstream.receive_completion(Completion::Finished);
      return;
    }
    if s.demand.is_none() {
      break;
    }
    let value = match s.iter.next() {
      Some(v) => v,
      None => break,
    };
    s.demand.decrement();
    let mut downstream = match s.downstream.take() {
      Some(d) => d,
      None => break,
    };
    drop(s);
    let extra = downstream.receive(value);
    s = state.lock();
    if !s.closed {
      s.downstream = Some(downstream);
      s.demand += extra;
    }
  }
  s.emitting = false;
}
