//! Maps each upstream value to an inner publisher and funnels every inner
//! value into one downstream stream, in arrival order.
//!
//! `concurrency` bounds the number of live inner subscriptions; inner
//! publishers beyond the bound are queued unsubscribed and started as live
//! ones finish. The stream completes once the outer upstream and every
//! inner one have finished; any failure tears the whole fan-in down.

use std::collections::VecDeque;
use std::marker::PhantomData;

use crate::demand::Demand;
use crate::gate::{Gate, StageSubscription};
use crate::publisher::Publisher;
use crate::subscriber::{Completion, Subscriber};
use crate::subscription::{BoxSubscription, Teardown};
use crate::sync::Lock;

#[derive(Clone)]
pub struct FlatMap<S, F> {
  source: S,
  f: F,
  concurrency: usize,
}

impl<S, F> FlatMap<S, F> {
  pub(crate) fn new(source: S, f: F) -> Self {
    Self { source, f, concurrency: usize::MAX }
  }

  /// Caps the number of simultaneously subscribed inner publishers.
  /// `max` is clamped to at least one.
  pub fn concurrency(mut self, max: usize) -> Self {
    self.concurrency = max.max(1);
    self
  }
}

impl<S, F, Inner> Publisher for FlatMap<S, F>
where
  S: Publisher,
  F: FnMut(S::Output) -> Inner + Send + 'static,
  Inner: Publisher<Failure = S::Failure> + Send + 'static,
{
  type Output = Inner::Output;
  type Failure = S::Failure;

  fn subscribe<Sub>(self, subscriber: Sub)
  where
    Sub: Subscriber<Input = Inner::Output, Failure = S::Failure>
      + Send
      + 'static,
  {
    let gate = Gate::new(subscriber);
    let teardown = Teardown::new();
    gate.attach(Box::new(StageSubscription {
      gate: gate.clone(),
      teardown: teardown.clone(),
    }));
    let fan = FanIn {
      state: Lock::new(FanState {
        f: self.f,
        active: 0,
        pending: VecDeque::new(),
        outer_done: false,
        concurrency: self.concurrency,
      }),
      gate,
      teardown,
    };
    self.source.subscribe(OuterSide { fan, _t: PhantomData });
  }
}

struct FanState<F, Inner> {
  f: F,
  /// Inner subscriptions currently live.
  active: usize,
  /// Mapped but not yet subscribed, waiting on a concurrency slot.
  pending: VecDeque<Inner>,
  outer_done: bool,
  concurrency: usize,
}

enum Next<Inner> {
  Launch(Inner),
  Finish,
  Idle,
}

struct FanIn<F, Inner, S: Subscriber> {
  state: Lock<FanState<F, Inner>>,
  gate: Gate<S>,
  teardown: Teardown,
}

impl<F, Inner, S> FanIn<F, Inner, S>
where
  F: Send + 'static,
  Inner: Publisher + Send + 'static,
  S: Subscriber<Input = Inner::Output, Failure = Inner::Failure>
    + Send
    + 'static,
{
  fn hook(&self, mut subscription: BoxSubscription) {
    subscription.request(Demand::unbounded());
    self.teardown.add(subscription);
  }

  fn launch(&self, inner: Inner) {
    inner.subscribe(InnerSide { fan: self.clone() });
  }

  fn outer_value<T>(&self, value: T)
  where
    F: FnMut(T) -> Inner,
  {
    if self.gate.is_closed() {
      return;
    }
    let launch = {
      let mut st = self.state.lock();
      let inner = (st.f)(value);
      if st.active < st.concurrency {
        st.active += 1;
        Some(inner)
      } else {
        st.pending.push_back(inner);
        None
      }
    };
    if let Some(inner) = launch {
      self.launch(inner);
    }
  }

  fn outer_finished(&self) {
    let done = {
      let mut st = self.state.lock();
      st.outer_done = true;
      st.active == 0 && st.pending.is_empty()
    };
    if done {
      self.gate.finish(Completion::Finished);
    }
  }

  fn inner_finished(&self) {
    if self.gate.is_closed() {
      return;
    }
    let next = {
      let mut st = self.state.lock();
      match st.pending.pop_front() {
        // the freed slot passes straight to the next queued inner
        Some(inner) => Next::Launch(inner),
        None => {
          st.active -= 1;
          if st.outer_done && st.active == 0 {
            Next::Finish
          } else {
            Next::Idle
          }
        }
      }
    };
    match next {
      Next::Launch(inner) => self.launch(inner),
      Next::Finish => self.gate.finish(Completion::Finished),
      Next::Idle => {}
    }
  }

  fn failed(&self, failure: S::Failure) {
    self.teardown.cancel();
    self.gate.finish(Completion::Failed(failure));
  }
}

impl<F, Inner, S: Subscriber> Clone for FanIn<F, Inner, S> {
  fn clone(&self) -> Self {
    Self {
      state: self.state.clone(),
      gate: self.gate.clone(),
      teardown: self.teardown.clone(),
    }
  }
}

struct OuterSide<T, F, Inner, S: Subscriber> {
  fan: FanIn<F, Inner, S>,
  _t: PhantomData<fn(T)>,
}

impl<T, F, Inner, S> Subscriber for OuterSide<T, F, Inner, S>
where
  T: Send + 'static,
  F: FnMut(T) -> Inner + Send + 'static,
  Inner: Publisher + Send + 'static,
  S: Subscriber<Input = Inner::Output, Failure = Inner::Failure>
    + Send
    + 'static,
{
  type Input = T;
  type Failure = S::Failure;

  fn receive_subscription(&mut self, subscription: BoxSubscription) {
    self.fan.hook(subscription)
  }

  fn receive(&mut self, input: T) -> Demand {
    self.fan.outer_value(input);
    Demand::none()
  }

  fn receive_completion(&mut self, completion: Completion<S::Failure>) {
    match completion {
      Completion::Finished => self.fan.outer_finished(),
      Completion::Failed(f) => self.fan.failed(f),
    }
  }
}

struct InnerSide<F, Inner, S: Subscriber> {
  fan: FanIn<F, Inner, S>,
}

impl<F, Inner, S> Subscriber for InnerSide<F, Inner, S>
where
  F: Send + 'static,
  Inner: Publisher + Send + 'static,
  S: Subscriber<Input = Inner::Output, Failure = Inner::Failure>
    + Send
    + 'static,
{
  type Input = Inner::Output;
  type Failure = S::Failure;

  fn receive_subscription(&mut self, subscription: BoxSubscription) {
    self.fan.hook(subscription)
  }

  fn receive(&mut self, input: Inner::Output) -> Demand {
    self.fan.gate.push(input);
    Demand::none()
  }

  fn receive_completion(&mut self, completion: Completion<S::Failure>) {
    match completion {
      Completion::Finished => self.fan.inner_finished(),
      Completion::Failed(f) => self.fan.failed(f),
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;
  use crate::sync::Lock;

  #[test]
  fn interleaves_inner_values_in_arrival_order() {
    let seen = Lock::new(Vec::new());
    let seen_c = seen.clone();

    let inner_a = Subject::<i32, ()>::new();
    let inner_b = Subject::<i32, ()>::new();
    let outer = Subject::<u8, ()>::new();
    let (a, b) = (inner_a.clone(), inner_b.clone());
    let _handle = outer
      .clone()
      .flat_map(move |k| if k == 0 { a.clone() } else { b.clone() })
      .sink(move |v| seen_c.lock().push(v));

    outer.send(0);
    outer.send(1);
    inner_a.send(1);
    inner_b.send(2);
    inner_a.send(3);
    assert_eq!(*seen.lock(), vec![1, 2, 3]);
  }

  #[test]
  fn concurrency_limit_queues_later_inners() {
    let seen = Lock::new(Vec::new());
    let seen_c = seen.clone();

    let inner_a = Subject::<i32, ()>::new();
    let inner_b = Subject::<i32, ()>::new();
    let outer = Subject::<u8, ()>::new();
    let (a, b) = (inner_a.clone(), inner_b.clone());
    let _handle = outer
      .clone()
      .flat_map(move |k| if k == 0 { a.clone() } else { b.clone() })
      .concurrency(1)
      .sink(move |v| seen_c.lock().push(v));

    outer.send(0);
    outer.send(1);
    assert_eq!(inner_a.subscriber_count(), 1);
    assert_eq!(inner_b.subscriber_count(), 0);

    // values sent to the queued inner before its slot opens are lost,
    // exactly as for any subject without subscribers
    inner_b.send(99);
    inner_a.send(1);
    inner_a.send_completion(Completion::Finished);
    assert_eq!(inner_b.subscriber_count(), 1);

    inner_b.send(2);
    assert_eq!(*seen.lock(), vec![1, 2]);
  }

  #[test]
  fn limit_one_drains_each_cold_inner_in_turn() {
    let seen = Lock::new(Vec::new());
    let seen_c = seen.clone();

    from_iter::<_, ()>(vec![vec!['a', 'b'], vec!['c']])
      .flat_map(from_iter)
      .concurrency(1)
      .sink(move |v| seen_c.lock().push(v));

    assert_eq!(*seen.lock(), vec!['a', 'b', 'c']);
  }

  #[test]
  fn completes_after_outer_and_every_inner_finish() {
    let outcome = Lock::new(None);
    let outcome_c = outcome.clone();

    let inner = Subject::<i32, ()>::new();
    let outer = Subject::<u8, ()>::new();
    let inner_c = inner.clone();
    let _handle = outer
      .clone()
      .flat_map(move |_| inner_c.clone())
      .sink_with(|_| {}, move |c| *outcome_c.lock() = Some(c));

    outer.send(0);
    outer.send_completion(Completion::Finished);
    assert_eq!(*outcome.lock(), None);

    inner.send_completion(Completion::Finished);
    assert_eq!(*outcome.lock(), Some(Completion::Finished));
  }

  #[test]
  fn inner_failure_tears_the_fan_in_down() {
    let outcome = Lock::new(None);
    let outcome_c = outcome.clone();

    let healthy = Subject::<i32, &'static str>::new();
    let outer = Subject::<u8, &'static str>::new();
    let healthy_c = healthy.clone();
    let _handle = outer
      .clone()
      .flat_map(move |k| {
        if k == 0 {
          healthy_c.clone().boxed()
        } else {
          fail::<i32, &'static str>("inner broke").boxed()
        }
      })
      .sink_with(|_| {}, move |c| *outcome_c.lock() = Some(c));

    outer.send(0);
    assert_eq!(healthy.subscriber_count(), 1);

    outer.send(1);
    assert_eq!(*outcome.lock(), Some(Completion::Failed("inner broke")));
    assert_eq!(healthy.subscriber_count(), 0);
    assert_eq!(outer.subscriber_count(), 0);
  }
}
