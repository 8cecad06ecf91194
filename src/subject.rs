//! Subjects: externally fed, multicasting publishers.
//!
//! A subject has no upstream to exert backpressure on, so delivery is
//! at-most-current-demand: a subscriber whose demand is exhausted simply
//! misses the value. A terminal event freezes the subject; late subscribers
//! receive only that terminal event.

mod behavior;
mod core;

pub use behavior::BehaviorSubject;

use crate::publisher::Publisher;
use crate::subscriber::{Completion, Subscriber};
use self::core::SubjectCore;

/// Value-relay subject: every `send` goes to each currently attached
/// subscriber with outstanding demand; nothing is retained or buffered on
/// behalf of slow subscribers.
pub struct Subject<T, F> {
  core: SubjectCore<T, F>,
}

impl<T, F> Subject<T, F>
where
  T: Clone + Send + 'static,
  F: Clone + Send + 'static,
{
  pub fn new() -> Self { Self { core: SubjectCore::new(None, false) } }

  /// Forwards `value` to every attached subscriber with outstanding demand.
  /// Sends from multiple threads are serialized per subject.
  #[inline]
  pub fn send(&self, value: T) { self.core.send(value) }

  /// Freezes the subject. Subsequent sends are ignored; subsequent
  /// subscribers receive only this terminal event.
  #[inline]
  pub fn send_completion(&self, completion: Completion<F>) {
    self.core.send_completion(completion)
  }

  /// Number of currently attached subscribers.
  #[inline]
  pub fn subscriber_count(&self) -> usize { self.core.subscriber_count() }

  #[inline]
  pub fn is_terminated(&self) -> bool { self.core.is_terminated() }
}

impl<T, F> Default for Subject<T, F>
where
  T: Clone + Send + 'static,
  F: Clone + Send + 'static,
{
  fn default() -> Self { Self::new() }
}

impl<T, F> Clone for Subject<T, F> {
  #[inline]
  fn clone(&self) -> Self { Self { core: self.core.clone() } }
}

impl<T, F> Publisher for Subject<T, F>
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
  use crate::subscription::BoxSubscription;
  use crate::sync::Lock;

  #[test]
  fn multicasts_to_every_subscriber() {
    let a = Lock::new(Vec::new());
    let b = Lock::new(Vec::new());
    let a_c = a.clone();
    let b_c = b.clone();

    let subject = Subject::<i32, ()>::new();
    subject.clone().sink(move |v| a_c.lock().push(v));
    subject.clone().sink(move |v| b_c.lock().push(v));
    assert_eq!(subject.subscriber_count(), 2);

    subject.send(1);
    subject.send(2);
    assert_eq!(*a.lock(), vec![1, 2]);
    assert_eq!(*b.lock(), vec![1, 2]);
  }

  #[test]
  fn value_is_dropped_for_exhausted_subscriber() {
    struct Stingy {
      values: Lock<Vec<i32>>,
    }

    impl Subscriber for Stingy {
      type Input = i32;
      type Failure = ();

      fn receive_subscription(&mut self, mut subscription: BoxSubscription) {
        subscription.request(Demand::exact(1));
      }

      fn receive(&mut self, input: i32) -> Demand {
        self.values.lock().push(input);
        Demand::none()
      }

      fn receive_completion(&mut self, _completion: Completion<()>) {}
    }

    let values = Lock::new(Vec::new());
    let subject = Subject::<i32, ()>::new();
    subject.clone().subscribe(Stingy { values: values.clone() });

    subject.send(1);
    subject.send(2);
    // demand was one: the second value is gone, not buffered
    assert_eq!(*values.lock(), vec![1]);
  }

  #[test]
  fn terminal_freezes_and_replays_to_late_subscribers() {
    let early = Lock::new(Vec::new());
    let early_c = early.clone();
    let late_completion = Lock::new(None);
    let late_c = late_completion.clone();

    let subject = Subject::<i32, &'static str>::new();
    subject.clone().sink(move |v| early_c.lock().push(v));

    subject.send(1);
    subject.send_completion(Completion::Failed("done"));
    subject.send(2);
    assert!(subject.is_terminated());
    assert_eq!(subject.subscriber_count(), 0);

    subject.clone().sink_with(
      |_| panic!("late subscriber must not see values"),
      move |c| *late_c.lock() = Some(c),
    );
    assert_eq!(*early.lock(), vec![1]);
    assert_eq!(*late_completion.lock(), Some(Completion::Failed("done")));
  }

  #[test]
  fn cancelled_subscriber_detaches() {
    let subject = Subject::<i32, ()>::new();
    let mut handle = subject.clone().sink(|_| {});
    assert_eq!(subject.subscriber_count(), 1);

    use crate::subscription::Subscription;
    handle.cancel();
    assert_eq!(subject.subscriber_count(), 0);
  }

  #[test]
  fn concurrent_sends_are_serialized_per_subscriber() {
    use std::thread;

    let values = Lock::new(Vec::new());
    let values_c = values.clone();
    let subject = Subject::<i32, ()>::new();
    subject.clone().sink(move |v| values_c.lock().push(v));

    let senders: Vec<_> = (0..4)
      .map(|t| {
        let subject = subject.clone();
        thread::spawn(move || {
          for i in 0..100 {
            subject.send(t * 100 + i);
          }
        })
      })
      .collect();
    for s in senders {
      s.join().unwrap();
    }

    let seen = values.lock();
    assert_eq!(seen.len(), 400);
    // per-sender order is preserved even though sends interleave
    for t in 0..4 {
      let of_t: Vec<_> =
        seen.iter().filter(|v| **v / 100 == t).copied().collect();
      let mut sorted = of_t.clone();
      sorted.sort_unstable();
      assert_eq!(of_t, sorted);
    }
  }
}
