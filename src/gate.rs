//! The downstream edge shared by every stateful operator.
//!
//! A `Gate` owns the one subscriber a stage delivers to, the outstanding
//! downstream demand, a queue of ready-to-emit outputs and the pending
//! terminal event. It is the stage's serialization point: emissions from any
//! number of upstream threads funnel through `push`/`finish`, and the drain
//! loop guarantees strictly sequential deliveries. The lock is never held
//! across a call into the subscriber, so re-entrant `request`/`cancel` from
//! inside a delivery cannot deadlock.
//!
//! Multi-upstream operators request unbounded demand upstream and let the
//! gate absorb the difference when the downstream is slower; the queue is
//! deliberately unbounded (see the per-operator docs for the trade-off).

use std::collections::VecDeque;

use crate::demand::Demand;
use crate::subscriber::{Completion, Subscriber};
use crate::subscription::{BoxSubscription, Subscription, Teardown};
use crate::sync::Lock;

pub(crate) struct Gate<S: Subscriber> {
  inner: Lock<GateInner<S>>,
}

struct GateInner<S: Subscriber> {
  downstream: Option<S>,
  queue: VecDeque<S::Input>,
  demand: Demand,
  terminal: Option<Completion<S::Failure>>,
  /// A drain loop is live somewhere on the stack (or on another thread).
  emitting: bool,
  closed: bool,
}

impl<S> Gate<S>
where
  S: Subscriber + Send + 'static,
{
  pub fn new(downstream: S) -> Self {
    Self {
      inner: Lock::new(GateInner {
        downstream: Some(downstream),
        queue: VecDeque::new(),
        demand: Demand::none(),
        terminal: None,
        emitting: false,
        closed: false,
      }),
    }
  }

  /// Hands `subscription` to the downstream subscriber, outside the lock.
  /// Demand requested re-entrantly during the call accumulates and is
  /// served by the drain that follows.
  pub fn attach(&self, subscription: BoxSubscription) {
    let downstream = {
      let mut inner = self.inner.lock();
      if inner.closed {
        return;
      }
      inner.emitting = true;
      inner.downstream.take()
    };
    match downstream {
      Some(mut d) => {
        d.receive_subscription(subscription);
        let mut inner = self.inner.lock();
        if !inner.closed {
          inner.downstream = Some(d);
        }
        inner.emitting = false;
      }
      None => self.inner.lock().emitting = false,
    }
    self.drain();
  }

  /// Queues one ready output and drains as far as demand allows.
  pub fn push(&self, value: S::Input) {
    self.enqueue(value);
    self.drain();
  }

  /// Queues one ready output without draining. A stage whose emissions
  /// must stay ordered relative to its own state changes enqueues while
  /// holding its state lock and calls [`Gate::flush`] after releasing it.
  pub fn enqueue(&self, value: S::Input) {
    let mut inner = self.inner.lock();
    if inner.closed || inner.terminal.is_some() {
      return;
    }
    inner.queue.push_back(value);
  }

  /// Delivers queued outputs as far as demand allows.
  pub fn flush(&self) { self.drain(); }

  /// Records the terminal event. A failure jumps the queue (buffered values
  /// are discarded); a normal completion is delivered once the queue has
  /// drained.
  pub fn finish(&self, completion: Completion<S::Failure>) {
    {
      let mut inner = self.inner.lock();
      if inner.closed || inner.terminal.is_some() {
        return;
      }
      if completion.is_failure() {
        inner.queue.clear();
      }
      inner.terminal = Some(completion);
    }
    self.drain();
  }

  pub fn request(&self, demand: Demand) {
    if demand.is_none() {
      return;
    }
    {
      let mut inner = self.inner.lock();
      if inner.closed {
        return;
      }
      inner.demand += demand;
    }
    self.drain();
  }

  /// Cancellation entry: stops future deliveries and drops buffered state.
  /// An in-flight delivery may finish; no new one starts afterwards.
  pub fn close(&self) {
    let mut inner = self.inner.lock();
    inner.closed = true;
    inner.queue.clear();
    inner.terminal = None;
    inner.downstream = None;
  }

  pub fn is_closed(&self) -> bool { self.inner.lock().closed }

  fn drain(&self) {
    let mut inner = self.inner.lock();
    if inner.emitting || inner.closed {
      return;
    }
    inner.emitting = true;
    loop {
      if inner.closed {
        break;
      }
      if !inner.demand.is_none() && !inner.queue.is_empty() {
        let value = match inner.queue.pop_front() {
          Some(v) => v,
          None => break,
        };
        inner.demand.decrement();
        let mut downstream = match inner.downstream.take() {
          Some(d) => d,
          None => break,
        };
        drop(inner);
        let extra = downstream.receive(value);
        inner = self.inner.lock();
        if !inner.closed {
          inner.downstream = Some(downstream);
          inner.demand += extra;
        }
        continue;
      }
      if inner.queue.is_empty() {
        if let Some(completion) = inner.terminal.take() {
          inner.closed = true;
          let downstream = inner.downstream.take();
          drop(inner);
          if let Some(mut d) = downstream {
            d.receive_completion(completion);
          }
          return;
        }
      }
      break;
    }
    inner.emitting = false;
  }
}

impl<S: Subscriber> Clone for Gate<S> {
  #[inline]
  fn clone(&self) -> Self { Self { inner: self.inner.clone() } }
}

/// The subscription a stateful operator hands downstream: demand goes to the
/// gate, cancellation closes the gate and tears down every upstream link.
pub(crate) struct StageSubscription<S: Subscriber> {
  pub gate: Gate<S>,
  pub teardown: Teardown,
}

impl<S> Subscription for StageSubscription<S>
where
  S: Subscriber + Send + 'static,
{
  #[inline]
  fn request(&mut self, demand: Demand) { self.gate.request(demand) }

  fn cancel(&mut self) {
    self.gate.close();
    self.teardown.cancel();
  }

  #[inline]
  fn is_closed(&self) -> bool { self.gate.is_closed() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::subscription::InertSubscription;

  struct Recorder {
    values: Lock<Vec<i32>>,
    completions: Lock<Vec<Completion<&'static str>>>,
    refill: Demand,
  }

  impl Subscriber for Recorder {
    type Input = i32;
    type Failure = &'static str;

    fn receive_subscription(&mut self, _subscription: BoxSubscription) {}

    fn receive(&mut self, input: i32) -> Demand {
      self.values.lock().push(input);
      self.refill
    }

    fn receive_completion(&mut self, completion: Completion<&'static str>) {
      self.completions.lock().push(completion);
    }
  }

  fn recorder() -> (Recorder, Lock<Vec<i32>>, Lock<Vec<Completion<&'static str>>>) {
    let values = Lock::new(Vec::new());
    let completions = Lock::new(Vec::new());
    let r = Recorder {
      values: values.clone(),
      completions: completions.clone(),
      refill: Demand::none(),
    };
    (r, values, completions)
  }

  #[test]
  fn deliveries_never_exceed_demand() {
    let (r, values, _) = recorder();
    let gate = Gate::new(r);
    gate.attach(Box::new(InertSubscription));

    for v in 0..5 {
      gate.push(v);
    }
    assert!(values.lock().is_empty());

    gate.request(Demand::exact(2));
    assert_eq!(*values.lock(), vec![0, 1]);

    gate.request(Demand::exact(1));
    assert_eq!(*values.lock(), vec![0, 1, 2]);
  }

  #[test]
  fn returned_demand_adds_to_outstanding() {
    let (mut r, values, _) = recorder();
    r.refill = Demand::exact(1);
    let gate = Gate::new(r);
    gate.attach(Box::new(InertSubscription));

    for v in 0..4 {
      gate.push(v);
    }
    // one requested unit plus one refill per delivery drains everything
    gate.request(Demand::exact(1));
    assert_eq!(*values.lock(), vec![0, 1, 2, 3]);
  }

  #[test]
  fn enqueue_holds_values_until_flushed() {
    let (r, values, _) = recorder();
    let gate = Gate::new(r);
    gate.attach(Box::new(InertSubscription));
    gate.request(Demand::unbounded());

    gate.enqueue(1);
    assert!(values.lock().is_empty());

    gate.flush();
    assert_eq!(*values.lock(), vec![1]);
  }

  #[test]
  fn completion_waits_for_buffered_values() {
    let (r, values, completions) = recorder();
    let gate = Gate::new(r);
    gate.attach(Box::new(InertSubscription));

    gate.push(1);
    gate.finish(Completion::Finished);
    assert!(completions.lock().is_empty());

    gate.request(Demand::exact(1));
    assert_eq!(*values.lock(), vec![1]);
    assert_eq!(*completions.lock(), vec![Completion::Finished]);
  }

  #[test]
  fn failure_jumps_the_queue() {
    let (r, values, completions) = recorder();
    let gate = Gate::new(r);
    gate.attach(Box::new(InertSubscription));

    gate.push(1);
    gate.finish(Completion::Failed("boom"));
    assert!(values.lock().is_empty());
    assert_eq!(*completions.lock(), vec![Completion::Failed("boom")]);
  }

  #[test]
  fn close_discards_everything() {
    let (r, values, completions) = recorder();
    let gate = Gate::new(r);
    gate.attach(Box::new(InertSubscription));

    gate.push(1);
    gate.close();
    gate.request(Demand::unbounded());
    gate.finish(Completion::Finished);
    assert!(values.lock().is_empty());
    assert!(completions.lock().is_empty());
    assert!(gate.is_closed());
  }
}
