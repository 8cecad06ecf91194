//! Combines the most recent value of two upstreams.
//!
//! Both upstreams are driven with unbounded demand; the gate buffers
//! combined outputs for a slower downstream. The trade-off: memory is
//! bounded by downstream lag, not by upstream demand accounting.
//!
//! The combining closure runs and its output is queued inside the
//! operator's critical section, so concurrent emissions from the two
//! upstreams cannot deliver a stale tuple after a fresher one. The
//! closure therefore must not feed either upstream; doing so would
//! re-enter the critical section and deadlock.

use crate::demand::Demand;
use crate::gate::{Gate, StageSubscription};
use crate::publisher::Publisher;
use crate::subscriber::{Completion, Subscriber};
use crate::subscription::{BoxSubscription, Teardown};
use crate::sync::Lock;

#[derive(Clone)]
pub struct CombineLatest<A, B, F> {
  pub(crate) a: A,
  pub(crate) b: B,
  pub(crate) binary_op: F,
}

impl<A, B, F, Out> Publisher for CombineLatest<A, B, F>
where
  A: Publisher,
  B: Publisher<Failure = A::Failure>,
  A::Output: Clone,
  B::Output: Clone,
  F: FnMut(A::Output, B::Output) -> Out + Send + 'static,
  Out: Send + 'static,
{
  type Output = Out;
  type Failure = A::Failure;

  fn subscribe<Sub>(self, subscriber: Sub)
  where
    Sub: Subscriber<Input = Out, Failure = A::Failure> + Send + 'static,
  {
    let gate = Gate::new(subscriber);
    let teardown = Teardown::new();
    gate.attach(Box::new(StageSubscription {
      gate: gate.clone(),
      teardown: teardown.clone(),
    }));
    let combiner = Combiner {
      state: Lock::new(CombineState {
        latest_left: None,
        latest_right: None,
        done_left: false,
        done_right: false,
        binary_op: self.binary_op,
      }),
      gate,
      teardown,
    };
    self.a.subscribe(LeftSide { combiner: combiner.clone() });
    self.b.subscribe(RightSide { combiner });
  }
}

#[derive(Clone, Copy)]
enum Side {
  Left,
  Right,
}

struct CombineState<A, B, F> {
  latest_left: Option<A>,
  latest_right: Option<B>,
  done_left: bool,
  done_right: bool,
  binary_op: F,
}

struct Combiner<A, B, F, S: Subscriber> {
  state: Lock<CombineState<A, B, F>>,
  gate: Gate<S>,
  teardown: Teardown,
}

impl<A, B, F, S> Combiner<A, B, F, S>
where
  A: Clone + Send + 'static,
  B: Clone + Send + 'static,
  F: FnMut(A, B) -> S::Input + Send + 'static,
  S: Subscriber + Send + 'static,
{
  fn hook(&self, mut subscription: BoxSubscription) {
    subscription.request(Demand::unbounded());
    self.teardown.add(subscription);
  }

  fn left(&self, value: A) {
    let ready = {
      let mut st = self.state.lock();
      st.latest_left = Some(value);
      match (st.latest_left.clone(), st.latest_right.clone()) {
        (Some(a), Some(b)) => {
          // enqueue under the state lock: queue order must match the
          // order the latest-value slots were updated in
          self.gate.enqueue((st.binary_op)(a, b));
          true
        }
        _ => false,
      }
    };
    if ready {
      self.gate.flush();
    }
  }

  fn right(&self, value: B) {
    let ready = {
      let mut st = self.state.lock();
      st.latest_right = Some(value);
      match (st.latest_left.clone(), st.latest_right.clone()) {
        (Some(a), Some(b)) => {
          self.gate.enqueue((st.binary_op)(a, b));
          true
        }
        _ => false,
      }
    };
    if ready {
      self.gate.flush();
    }
  }

  fn side_finished(&self, side: Side) {
    let both = {
      let mut st = self.state.lock();
      match side {
        Side::Left => st.done_left = true,
        Side::Right => st.done_right = true,
      }
      st.done_left && st.done_right
    };
    if both {
      self.teardown.cancel();
      self.gate.finish(Completion::Finished);
    }
  }

  /// Fail fast: the sibling upstream is cancelled immediately.
  fn failed(&self, failure: S::Failure) {
    self.teardown.cancel();
    self.gate.finish(Completion::Failed(failure));
  }
}

impl<A, B, F, S: Subscriber> Clone for Combiner<A, B, F, S> {
  fn clone(&self) -> Self {
    Self {
      state: self.state.clone(),
      gate: self.gate.clone(),
      teardown: self.teardown.clone(),
    }
  }
}

struct LeftSide<A, B, F, S: Subscriber> {
  combiner: Combiner<A, B, F, S>,
}

impl<A, B, F, S> Subscriber for LeftSide<A, B, F, S>
where
  A: Clone + Send + 'static,
  B: Clone + Send + 'static,
  F: FnMut(A, B) -> S::Input + Send + 'static,
  S: Subscriber + Send + 'static,
{
  type Input = A;
  type Failure = S::Failure;

  fn receive_subscription(&mut self, subscription: BoxSubscription) {
    self.combiner.hook(subscription)
  }

  fn receive(&mut self, input: A) -> Demand {
    self.combiner.left(input);
    Demand::none()
  }

  fn receive_completion(&mut self, completion: Completion<S::Failure>) {
    match completion {
      Completion::Finished => self.combiner.side_finished(Side::Left),
      Completion::Failed(f) => self.combiner.failed(f),
    }
  }
}

struct RightSide<A, B, F, S: Subscriber> {
  combiner: Combiner<A, B, F, S>,
}

impl<A, B, F, S> Subscriber for RightSide<A, B, F, S>
where
  A: Clone + Send + 'static,
  B: Clone + Send + 'static,
  F: FnMut(A, B) -> S::Input + Send + 'static,
  S: Subscriber + Send + 'static,
{
  type Input = B;
  type Failure = S::Failure;

  fn receive_subscription(&mut self, subscription: BoxSubscription) {
    self.combiner.hook(subscription)
  }

  fn receive(&mut self, input: B) -> Demand {
    self.combiner.right(input);
    Demand::none()
  }

  fn receive_completion(&mut self, completion: Completion<S::Failure>) {
    match completion {
      Completion::Finished => self.combiner.side_finished(Side::Right),
      Completion::Failed(f) => self.combiner.failed(f),
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;
  use crate::sync::Lock;

  #[test]
  fn emits_on_every_update_once_both_sides_have_a_value() {
    let seen = Lock::new(Vec::new());
    let seen_c = seen.clone();

    let left = Subject::<i32, ()>::new();
    let right = Subject::<i32, ()>::new();
    let _handle = left
      .clone()
      .combine_latest(right.clone(), |a, b| (a, b))
      .sink(move |pair| seen_c.lock().push(pair));

    left.send(1);
    assert!(seen.lock().is_empty());

    right.send(10);
    left.send(2);
    right.send(20);
    assert_eq!(*seen.lock(), vec![(1, 10), (2, 10), (2, 20)]);
  }

  #[test]
  fn completes_only_after_both_sides_finish() {
    let seen = Lock::new(Vec::new());
    let outcome = Lock::new(None);
    let seen_c = seen.clone();
    let outcome_c = outcome.clone();

    let left = Subject::<i32, ()>::new();
    let right = Subject::<i32, ()>::new();
    let _handle = left.clone().combine_latest(right.clone(), |a, b| a + b).sink_with(
      move |v| seen_c.lock().push(v),
      move |c| *outcome_c.lock() = Some(c),
    );

    left.send(1);
    left.send_completion(Completion::Finished);
    assert_eq!(*outcome.lock(), None);

    // the finished side's last value keeps combining
    right.send(10);
    right.send(20);
    right.send_completion(Completion::Finished);
    assert_eq!(*seen.lock(), vec![11, 21]);
    assert_eq!(*outcome.lock(), Some(Completion::Finished));
  }

  #[test]
  fn concurrent_emissions_never_deliver_a_stale_tuple() {
    use std::thread;

    let seen = Lock::new(Vec::new());
    let seen_c = seen.clone();

    let left = Subject::<i32, ()>::new();
    let right = Subject::<i32, ()>::new();
    let _handle = left
      .clone()
      .combine_latest(right.clone(), |a, b| (a, b))
      .sink(move |pair| seen_c.lock().push(pair));

    let l = left.clone();
    let r = right.clone();
    let t_left = thread::spawn(move || {
      for i in 0..100 {
        l.send(i);
      }
    });
    let t_right = thread::spawn(move || {
      for i in 0..100 {
        r.send(i);
      }
    });
    t_left.join().unwrap();
    t_right.join().unwrap();

    // each side counts upward, so a snapshot taken and queued atomically
    // can never be followed by one with a smaller component
    let seen = seen.lock();
    assert!(!seen.is_empty());
    for pair in seen.windows(2) {
      assert!(pair[1].0 >= pair[0].0, "left went backwards: {pair:?}");
      assert!(pair[1].1 >= pair[0].1, "right went backwards: {pair:?}");
    }
  }

  #[test]
  fn failure_cancels_the_sibling_upstream() {
    let outcome = Lock::new(None);
    let outcome_c = outcome.clone();

    let left = Subject::<i32, &'static str>::new();
    let right = Subject::<i32, &'static str>::new();
    let _handle = left.clone().combine_latest(right.clone(), |a, b| a + b).sink_with(
      |_| panic!("no value expected"),
      move |c| *outcome_c.lock() = Some(c),
    );
    assert_eq!(right.subscriber_count(), 1);

    left.send_completion(Completion::Failed("boom"));
    assert_eq!(*outcome.lock(), Some(Completion::Failed("boom")));
    assert_eq!(right.subscriber_count(), 0);
  }
}
