//! Pairs two upstreams in strict lockstep: the n-th output is the n-th
//! value of each side. The faster side is queued until its partner arrives;
//! once a finished side's queue is empty no further pair is possible and
//! the stream completes, cancelling the sibling.

use std::collections::VecDeque;

use crate::demand::Demand;
use crate::gate::{Gate, StageSubscription};
use crate::publisher::Publisher;
use crate::subscriber::{Completion, Subscriber};
use crate::subscription::{BoxSubscription, Teardown};
use crate::sync::Lock;

#[derive(Clone)]
pub struct Zip<A, B> {
  pub(crate) a: A,
  pub(crate) b: B,
}

impl<A, B> Publisher for Zip<A, B>
where
  A: Publisher,
  B: Publisher<Failure = A::Failure>,
{
  type Output = (A::Output, B::Output);
  type Failure = A::Failure;

  fn subscribe<Sub>(self, subscriber: Sub)
  where
    Sub: Subscriber<Input = (A::Output, B::Output), Failure = A::Failure>
      + Send
      + 'static,
  {
    let gate = Gate::new(subscriber);
    let teardown = Teardown::new();
    gate.attach(Box::new(StageSubscription {
      gate: gate.clone(),
      teardown: teardown.clone(),
    }));
    let pairer = Pairer {
      state: Lock::new(ZipState {
        left: VecDeque::new(),
        right: VecDeque::new(),
        done_left: false,
        done_right: false,
      }),
      gate,
      teardown,
    };
    self.a.subscribe(LeftSide { pairer: pairer.clone() });
    self.b.subscribe(RightSide { pairer });
  }
}

struct ZipState<A, B> {
  left: VecDeque<A>,
  right: VecDeque<B>,
  done_left: bool,
  done_right: bool,
}

enum Step<T> {
  Emit(T, bool),
  End,
  Stashed,
}

struct Pairer<A, B, S: Subscriber> {
  state: Lock<ZipState<A, B>>,
  gate: Gate<S>,
  teardown: Teardown,
}

impl<A, B, S> Pairer<A, B, S>
where
  A: Send + 'static,
  B: Send + 'static,
  S: Subscriber<Input = (A, B)> + Send + 'static,
{
  fn hook(&self, mut subscription: BoxSubscription) {
    subscription.request(Demand::unbounded());
    self.teardown.add(subscription);
  }

  fn left(&self, value: A) {
    let step = {
      let mut st = self.state.lock();
      match st.right.pop_front() {
        Some(b) => {
          let ended = st.done_right && st.right.is_empty();
          Step::Emit((value, b), ended)
        }
        None if st.done_right => Step::End,
        None => {
          st.left.push_back(value);
          Step::Stashed
        }
      }
    };
    self.apply(step);
  }

  fn right(&self, value: B) {
    let step = {
      let mut st = self.state.lock();
      match st.left.pop_front() {
        Some(a) => {
          let ended = st.done_left && st.left.is_empty();
          Step::Emit((a, value), ended)
        }
        None if st.done_left => Step::End,
        None => {
          st.right.push_back(value);
          Step::Stashed
        }
      }
    };
    self.apply(step);
  }

  fn apply(&self, step: Step<(A, B)>) {
    match step {
      Step::Emit(pair, ended) => {
        self.gate.push(pair);
        if ended {
          self.end();
        }
      }
      Step::End => self.end(),
      Step::Stashed => {}
    }
  }

  fn left_finished(&self) {
    let ended = {
      let mut st = self.state.lock();
      st.done_left = true;
      st.left.is_empty()
    };
    if ended {
      self.end();
    }
  }

  fn right_finished(&self) {
    let ended = {
      let mut st = self.state.lock();
      st.done_right = true;
      st.right.is_empty()
    };
    if ended {
      self.end();
    }
  }

  fn end(&self) {
    self.teardown.cancel();
    self.gate.finish(Completion::Finished);
  }

  fn failed(&self, failure: S::Failure) {
    self.teardown.cancel();
    self.gate.finish(Completion::Failed(failure));
  }
}

impl<A, B, S: Subscriber> Clone for Pairer<A, B, S> {
  fn clone(&self) -> Self {
    Self {
      state: self.state.clone(),
      gate: self.gate.clone(),
      teardown: self.teardown.clone(),
    }
  }
}

struct LeftSide<A, B, S: Subscriber> {
  pairer: Pairer<A, B, S>,
}

impl<A, B, S> Subscriber for LeftSide<A, B, S>
where
  A: Send + 'static,
  B: Send + 'static,
  S: Subscriber<Input = (A, B)> + Send + 'static,
{
  type Input = A;
  type Failure = S::Failure;

  fn receive_subscription(&mut self, subscription: BoxSubscription) {
    self.pairer.hook(subscription)
  }

  fn receive(&mut self, input: A) -> Demand {
    self.pairer.left(input);
    Demand::none()
  }

  fn receive_completion(&mut self, completion: Completion<S::Failure>) {
    match completion {
      Completion::Finished => self.pairer.left_finished(),
      Completion::Failed(f) => self.pairer.failed(f),
    }
  }
}

struct RightSide<A, B, S: Subscriber> {
  pairer: Pairer<A, B, S>,
}

impl<A, B, S> Subscriber for RightSide<A, B, S>
where
  A: Send + 'static,
  B: Send + 'static,
  S: Subscriber<Input = (A, B)> + Send + 'static,
{
  type Input = B;
  type Failure = S::Failure;

  fn receive_subscription(&mut self, subscription: BoxSubscription) {
    self.pairer.hook(subscription)
  }

  fn receive(&mut self, input: B) -> Demand {
    self.pairer.right(input);
    Demand::none()
  }

  fn receive_completion(&mut self, completion: Completion<S::Failure>) {
    match completion {
      Completion::Finished => self.pairer.right_finished(),
      Completion::Failed(f) => self.pairer.failed(f),
    }
  }
}
