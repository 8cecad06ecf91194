//! Emits at most one value per interval.
//!
//! The first value after an idle period opens a window. In `First` mode it
//! is emitted on the spot and later arrivals in the window are dropped; in
//! `Latest` mode the newest arrival is held and emitted when the window
//! closes. Completion flushes a held value and cancels the window timer.

use std::time::Duration;

use crate::demand::Demand;
use crate::gate::{Gate, StageSubscription};
use crate::publisher::Publisher;
use crate::scheduler::{Scheduler, TaskHandle};
use crate::subscriber::{Completion, Subscriber};
use crate::subscription::{BoxSubscription, Subscription, Teardown};
use crate::sync::Lock;

/// Which value of a throttle window survives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottleMode {
  First,
  Latest,
}

#[derive(Clone)]
pub struct Throttle<S, SD> {
  pub(crate) source: S,
  pub(crate) interval: Duration,
  pub(crate) mode: ThrottleMode,
  pub(crate) scheduler: SD,
}

impl<S, SD> Publisher for Throttle<S, SD>
where
  S: Publisher,
  SD: Scheduler,
{
  type Output = S::Output;
  type Failure = S::Failure;

  fn subscribe<Sub>(self, subscriber: Sub)
  where
    Sub: Subscriber<Input = S::Output, Failure = S::Failure> + Send + 'static,
  {
    let gate = Gate::new(subscriber);
    let teardown = Teardown::new();
    gate.attach(Box::new(StageSubscription {
      gate: gate.clone(),
      teardown: teardown.clone(),
    }));
    let state =
      Lock::new(ThrottleState { in_window: false, held: None, timer: None });
    teardown.add(Box::new(WindowSlot { state: state.clone() }));
    self.source.subscribe(ThrottleSubscriber {
      state,
      gate,
      teardown,
      interval: self.interval,
      mode: self.mode,
      scheduler: self.scheduler,
    });
  }
}

struct ThrottleState<T> {
  in_window: bool,
  held: Option<T>,
  timer: Option<TaskHandle>,
}

struct WindowSlot<T> {
  state: Lock<ThrottleState<T>>,
}

impl<T: Send + 'static> Subscription for WindowSlot<T> {
  fn request(&mut self, _demand: Demand) {}

  fn cancel(&mut self) {
    let timer = {
      let mut st = self.state.lock();
      st.held = None;
      st.timer.take()
    };
    if let Some(timer) = timer {
      timer.cancel();
    }
  }

  fn is_closed(&self) -> bool { false }
}

struct ThrottleSubscriber<T, SD, S: Subscriber> {
  state: Lock<ThrottleState<T>>,
  gate: Gate<S>,
  teardown: Teardown,
  interval: Duration,
  mode: ThrottleMode,
  scheduler: SD,
}

impl<T, SD, S> Subscriber for ThrottleSubscriber<T, SD, S>
where
  T: Send + 'static,
  SD: Scheduler,
  S: Subscriber<Input = T> + Send + 'static,
{
  type Input = T;
  type Failure = S::Failure;

  fn receive_subscription(&mut self, mut subscription: BoxSubscription) {
    subscription.request(Demand::unbounded());
    self.teardown.add(subscription);
  }

  fn receive(&mut self, input: T) -> Demand {
    let opened = {
      let mut st = self.state.lock();
      if st.in_window {
        if self.mode == ThrottleMode::Latest {
          st.held = Some(input);
        }
        false
      } else {
        st.in_window = true;
        match self.mode {
          ThrottleMode::First => {
            drop(st);
            self.gate.push(input);
          }
          ThrottleMode::Latest => st.held = Some(input),
        }
        true
      }
    };
    if opened {
      let state = self.state.clone();
      let gate = self.gate.clone();
      let timer = self.scheduler.schedule(self.interval, move || {
        let flushed = {
          let mut st = state.lock();
          st.in_window = false;
          st.timer = None;
          st.held.take()
        };
        if let Some(value) = flushed {
          gate.push(value);
        }
      });
      self.state.lock().timer = Some(timer);
    }
    Demand::none()
  }

  fn receive_completion(&mut self, completion: Completion<S::Failure>) {
    let (held, timer) = {
      let mut st = self.state.lock();
      (st.held.take(), st.timer.take())
    };
    if let Some(timer) = timer {
      timer.cancel();
    }
    match completion {
      Completion::Finished => {
        if let Some(value) = held {
          self.gate.push(value);
        }
        self.gate.finish(Completion::Finished);
      }
      Completion::Failed(f) => {
        self.teardown.cancel();
        self.gate.finish(Completion::Failed(f));
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;
  use crate::sync::Lock;

  fn throttled(
    mode: ThrottleMode,
  ) -> (Subject<i32, ()>, TestScheduler, Lock<Vec<i32>>, SinkHandle) {
    let seen = Lock::new(Vec::new());
    let seen_c = seen.clone();
    let scheduler = TestScheduler::new();
    let subject = Subject::<i32, ()>::new();
    let handle = subject
      .clone()
      .throttle(Duration::from_millis(100), mode, scheduler.clone())
      .sink(move |v| seen_c.lock().push(v));
    (subject, scheduler, seen, handle)
  }

  #[test]
  fn first_mode_drops_values_inside_the_window() {
    let (subject, scheduler, seen, _handle) = throttled(ThrottleMode::First);

    subject.send(1);
    assert_eq!(*seen.lock(), vec![1]);

    scheduler.advance(Duration::from_millis(10));
    subject.send(2);
    subject.send(3);
    assert_eq!(*seen.lock(), vec![1]);

    // window closed at 100; the next value opens a fresh one
    scheduler.advance(Duration::from_millis(100));
    subject.send(4);
    assert_eq!(*seen.lock(), vec![1, 4]);
  }

  #[test]
  fn latest_mode_emits_the_newest_value_at_the_window_close() {
    let (subject, scheduler, seen, _handle) = throttled(ThrottleMode::Latest);

    subject.send(1);
    scheduler.advance(Duration::from_millis(10));
    subject.send(2);
    assert!(seen.lock().is_empty());

    scheduler.advance(Duration::from_millis(90));
    assert_eq!(*seen.lock(), vec![2]);
  }

  #[test]
  fn completion_flushes_a_held_value() {
    let (subject, scheduler, seen, _handle) = throttled(ThrottleMode::Latest);

    subject.send(1);
    subject.send(2);
    subject.send_completion(Completion::Finished);
    assert_eq!(*seen.lock(), vec![2]);
    assert_eq!(scheduler.pending_tasks(), 0);
  }
}
