use super::core::SubjectCore;
use crate::publisher::Publisher;
use crate::subscriber::{Completion, Subscriber};

/// Current-value subject: retains the most recent value and replays it to
/// each newly attached subscriber (demand permitting) before any later send.
pub struct BehaviorSubject<T, F> {
  core: SubjectCore<T, F>,
}

impl<T, F> BehaviorSubject<T, F>
where
  T: Clone + Send + 'static,
  F: Clone + Send + 'static,
{
  pub fn new(initial: T) -> Self {
    Self { core: SubjectCore::new(Some(initial), true) }
  }

  /// The retained value, as of the most recent `send`.
  pub fn value(&self) -> T {
    // track_current guarantees the slot is always populated
    match self.core.current_value() {
      Some(v) => v,
      None => unreachable!("behavior subject always retains a value"),
    }
  }

  #[inline]
  pub fn send(&self, value: T) { self.core.send(value) }

  #[inline]
  pub fn send_completion(&self, completion: Completion<F>) {
    self.core.send_completion(completion)
  }

  #[inline]
  pub fn subscriber_count(&self) -> usize { self.core.subscriber_count() }

  #[inline]
  pub fn is_terminated(&self) -> bool { self.core.is_terminated() }
}

impl<T, F> Clone for BehaviorSubject<T, F> {
  #[inline]
  fn clone(&self) -> Self { Self { core: self.core.clone() } }
}

impl<T, F> Publisher for BehaviorSubject<T, F>
where
  T: Clone + Send + 'static,
  F: Clone + Send + 'static,
{
  type Output = T;
  type Failure = F;

  fn subscribe<S>(self, subscriber: S)
  where
    S: Subscriber<Input = T, Failure = F> + Send + 'static,
  {
    self.core.attach(subscriber)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::demand::Demand;
  use crate::publisher::PublisherExt;
  use crate::subscriber::Subscriber;
  use crate::subscription::BoxSubscription;
  use crate::sync::Lock;

  #[test]
  fn replays_latest_value_to_late_subscriber() {
    let early = Lock::new(Vec::new());
    let late = Lock::new(Vec::new());
    let early_c = early.clone();
    let late_c = late.clone();

    let subject = BehaviorSubject::<i32, ()>::new(0);
    subject.clone().sink(move |v| early_c.lock().push(v));
    subject.send(1);
    subject.send(2);

    subject.clone().sink(move |v| late_c.lock().push(v));
    assert_eq!(*early.lock(), vec![0, 1, 2]);
    // the late subscriber sees only the retained value, not history
    assert_eq!(*late.lock(), vec![2]);

    subject.send(3);
    assert_eq!(*late.lock(), vec![2, 3]);
    assert_eq!(subject.value(), 3);
  }

  #[test]
  fn replay_waits_for_demand() {
    struct Reluctant {
      values: Lock<Vec<i32>>,
      subscription: Lock<Option<BoxSubscription>>,
    }

    impl Subscriber for Reluctant {
      type Input = i32;
      type Failure = ();

      fn receive_subscription(&mut self, subscription: BoxSubscription) {
        *self.subscription.lock() = Some(subscription);
      }

      fn receive(&mut self, input: i32) -> Demand {
        self.values.lock().push(input);
        Demand::none()
      }

      fn receive_completion(&mut self, _completion: Completion<()>) {}
    }

    let values = Lock::new(Vec::new());
    let slot = Lock::new(None);
    let subject = BehaviorSubject::<i32, ()>::new(1);
    subject.clone().subscribe(Reluctant {
      values: values.clone(),
      subscription: slot.clone(),
    });
    assert!(values.lock().is_empty());

    // the current value moved on before demand arrived; the newer one wins
    subject.send(2);
    if let Some(s) = slot.lock().as_mut() {
      s.request(Demand::exact(1));
    }
    assert_eq!(*values.lock(), vec![2]);
  }

  #[test]
  fn frozen_subject_replays_only_the_terminal_event() {
    let late_values = Lock::new(Vec::new());
    let late_completion = Lock::new(None);
    let values_c = late_values.clone();
    let completion_c = late_completion.clone();

    let subject = BehaviorSubject::<i32, ()>::new(5);
    subject.send_completion(Completion::Finished);
    subject.clone().sink_with(
      move |v| values_c.lock().push(v),
      move |c| *completion_c.lock() = Some(c),
    );

    assert!(late_values.lock().is_empty());
    assert_eq!(*late_completion.lock(), Some(Completion::Finished));
  }
}
