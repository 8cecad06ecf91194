//! Emits a value only once `interval` has elapsed without a newer one.
//! Each arrival replaces the held value and restarts the timer. A normal
//! completion flushes the held value immediately; a failure discards it.

use std::time::Duration;

use crate::demand::Demand;
use crate::gate::{Gate, StageSubscription};
use crate::publisher::Publisher;
use crate::scheduler::{Scheduler, TaskHandle};
use crate::subscriber::{Completion, Subscriber};
use crate::subscription::{BoxSubscription, Subscription, Teardown};
use crate::sync::Lock;

#[derive(Clone)]
pub struct Debounce<S, SD> {
  pub(crate) source: S,
  pub(crate) interval: Duration,
  pub(crate) scheduler: SD,
}

impl<S, SD> Publisher for Debounce<S, SD>
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
    let state = Lock::new(DebounceState { held: None, timer: None });
    // downstream cancellation must also kill a pending timer
    teardown.add(Box::new(TimerSlot { state: state.clone() }));
    self.source.subscribe(DebounceSubscriber {
      state,
      gate,
      teardown,
      interval: self.interval,
      scheduler: self.scheduler,
    });
  }
}

struct DebounceState<T> {
  held: Option<T>,
  timer: Option<TaskHandle>,
}

/// Subscription view of the timer slot, so a `Teardown` can own it.
struct TimerSlot<T> {
  state: Lock<DebounceState<T>>,
}

impl<T: Send + 'static> Subscription for TimerSlot<T> {
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

struct DebounceSubscriber<T, SD, S: Subscriber> {
  state: Lock<DebounceState<T>>,
  gate: Gate<S>,
  teardown: Teardown,
  interval: Duration,
  scheduler: SD,
}

impl<T, SD, S> Subscriber for DebounceSubscriber<T, SD, S>
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
    let stale = {
      let mut st = self.state.lock();
      st.held = Some(input);
      st.timer.take()
    };
    if let Some(stale) = stale {
      stale.cancel();
    }
    let state = self.state.clone();
    let gate = self.gate.clone();
    let timer = self.scheduler.schedule(self.interval, move || {
      let value = state.lock().held.take();
      if let Some(value) = value {
        gate.push(value);
      }
    });
    self.state.lock().timer = Some(timer);
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
        // completion flushes the held value without waiting out the quiet
        // interval
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

  #[test]
  fn emits_only_after_a_quiet_interval() {
    let seen = Lock::new(Vec::new());
    let seen_c = seen.clone();

    let scheduler = TestScheduler::new();
    let subject = Subject::<i32, ()>::new();
    let _handle = subject
      .clone()
      .debounce(Duration::from_millis(100), scheduler.clone())
      .sink(move |v| seen_c.lock().push(v));

    subject.send(1);
    scheduler.advance(Duration::from_millis(30));
    subject.send(2);
    scheduler.advance(Duration::from_millis(10));
    subject.send(3);

    scheduler.advance(Duration::from_millis(99));
    assert!(seen.lock().is_empty());

    scheduler.advance(Duration::from_millis(1));
    assert_eq!(*seen.lock(), vec![3]);
  }

  #[test]
  fn cancellation_suppresses_the_pending_value() {
    let seen = Lock::new(Vec::new());
    let seen_c = seen.clone();

    let scheduler = TestScheduler::new();
    let subject = Subject::<i32, ()>::new();
    let mut handle = subject
      .clone()
      .debounce(Duration::from_millis(100), scheduler.clone())
      .sink(move |v| seen_c.lock().push(v));

    subject.send(1);
    scheduler.advance(Duration::from_millis(60));
    handle.cancel();
    scheduler.advance(Duration::from_millis(200));
    assert!(seen.lock().is_empty());
  }

  #[test]
  fn completion_flushes_the_held_value() {
    let seen = Lock::new(Vec::new());
    let outcome = Lock::new(None);
    let seen_c = seen.clone();
    let outcome_c = outcome.clone();

    let scheduler = TestScheduler::new();
    let subject = Subject::<i32, ()>::new();
    let _handle = subject
      .clone()
      .debounce(Duration::from_millis(100), scheduler.clone())
      .sink_with(
        move |v| seen_c.lock().push(v),
        move |c| *outcome_c.lock() = Some(c),
      );

    subject.send(7);
    subject.send_completion(Completion::Finished);
    assert_eq!(*seen.lock(), vec![7]);
    assert_eq!(*outcome.lock(), Some(Completion::Finished));
    assert_eq!(scheduler.pending_tasks(), 0);
  }
}
