//! The registry shared by every handle of one subject.
//!
//! This is the only structure in the crate mutated from multiple external
//! call sites (the feed side and the attach/detach side), so one lock is the
//! subject's whole mutual-exclusion domain. Deliveries happen outside the
//! lock: the deliverer checks a subscriber out of its entry (`busy`), and
//! values sent meanwhile queue into the entry's pending run, bounded by the
//! demand that was outstanding when they were accepted.

use std::collections::VecDeque;

use crate::demand::Demand;
use crate::subscriber::{BoxSubscriber, Completion, Subscriber};
use crate::subscription::{InertSubscription, Subscription};
use crate::sync::Lock;

pub(crate) struct SubjectCore<T, F> {
  inner: Lock<CoreInner<T, F>>,
}

struct CoreInner<T, F> {
  entries: Vec<Entry<T, F>>,
  next_id: u64,
  terminal: Option<Completion<F>>,
  /// Latest sent value, tracked only for current-value subjects.
  current: Option<T>,
  track_current: bool,
}

struct Entry<T, F> {
  id: u64,
  /// `None` while attaching or while checked out by a deliverer.
  subscriber: Option<BoxSubscriber<T, F>>,
  busy: bool,
  demand: Demand,
  /// Values accepted against demand but not yet delivered; only grows while
  /// a delivery to this subscriber is in flight.
  pending: VecDeque<T>,
  /// Current-value replay still owed to this subscriber.
  needs_current: bool,
  closed: bool,
}

impl<T, F> Clone for SubjectCore<T, F> {
  #[inline]
  fn clone(&self) -> Self { Self { inner: self.inner.clone() } }
}

impl<T, F> SubjectCore<T, F>
where
  T: Clone + Send + 'static,
  F: Clone + Send + 'static,
{
  pub fn new(current: Option<T>, track_current: bool) -> Self {
    Self {
      inner: Lock::new(CoreInner {
        entries: Vec::new(),
        next_id: 0,
        terminal: None,
        current,
        track_current,
      }),
    }
  }

  pub fn attach<S>(&self, mut subscriber: S)
  where
    S: Subscriber<Input = T, Failure = F> + Send + 'static,
  {
    let id = {
      let mut inner = self.inner.lock();
      if let Some(completion) = inner.terminal.clone() {
        drop(inner);
        subscriber.receive_subscription(Box::new(InertSubscription));
        subscriber.receive_completion(completion);
        return;
      }
      inner.next_id += 1;
      let id = inner.next_id;
      let needs_current = inner.track_current;
      inner.entries.push(Entry {
        id,
        subscriber: None,
        busy: false,
        demand: Demand::none(),
        pending: VecDeque::new(),
        needs_current,
        closed: false,
      });
      id
    };

    // hand out the subscription outside the lock; demand requested during
    // the call lands on the placeholder entry
    subscriber.receive_subscription(Box::new(SubjectSubscription {
      core: self.clone(),
      id,
    }));

    {
      let mut inner = self.inner.lock();
      let current = inner.current.clone();
      let frozen = inner.terminal.is_some();
      match inner.entries.iter_mut().find(|e| e.id == id) {
        Some(entry) if !entry.closed => {
          entry.subscriber = Some(Box::new(subscriber));
          if !frozen {
            replay_current(entry, current);
          }
        }
        _ => return, // cancelled during attach
      }
    }
    self.drain();
  }

  pub fn send(&self, value: T) {
    {
      let mut inner = self.inner.lock();
      if inner.terminal.is_some() {
        return;
      }
      if inner.track_current {
        inner.current = Some(value.clone());
      }
      for entry in inner.entries.iter_mut().filter(|e| !e.closed) {
        if entry.subscriber.is_none() && !entry.busy {
          // still attaching: indistinguishable from having no demand
          tracing::trace!(id = entry.id, "dropping value for attaching subscriber");
          continue;
        }
        if entry.demand.is_none() {
          tracing::trace!(id = entry.id, "dropping value: demand exhausted");
          continue;
        }
        entry.demand.decrement();
        entry.pending.push_back(value.clone());
        // this send supersedes any replay still owed
        entry.needs_current = false;
      }
    }
    self.drain();
  }

  pub fn send_completion(&self, completion: Completion<F>) {
    {
      let mut inner = self.inner.lock();
      if inner.terminal.is_some() {
        return;
      }
      if completion.is_failure() {
        for entry in inner.entries.iter_mut() {
          entry.pending.clear();
        }
      }
      inner.terminal = Some(completion);
    }
    self.drain();
  }

  pub fn request(&self, id: u64, demand: Demand) {
    if demand.is_none() {
      return;
    }
    {
      let mut inner = self.inner.lock();
      let current = inner.current.clone();
      let frozen = inner.terminal.is_some();
      let Some(entry) =
        inner.entries.iter_mut().find(|e| e.id == id && !e.closed)
      else {
        return;
      };
      entry.demand += demand;
      if !frozen {
        replay_current(entry, current);
      }
    }
    self.drain();
  }

  pub fn cancel(&self, id: u64) {
    let mut inner = self.inner.lock();
    if let Some(entry) = inner.entries.iter_mut().find(|e| e.id == id) {
      entry.closed = true;
      entry.pending.clear();
      if !entry.busy {
        entry.subscriber = None;
      }
    }
    inner.entries.retain(|e| !(e.closed && !e.busy));
  }

  pub fn is_active(&self, id: u64) -> bool {
    self
      .inner
      .lock()
      .entries
      .iter()
      .any(|e| e.id == id && !e.closed)
  }

  pub fn subscriber_count(&self) -> usize {
    self.inner.lock().entries.iter().filter(|e| !e.closed).count()
  }

  pub fn is_terminated(&self) -> bool { self.inner.lock().terminal.is_some() }

  pub fn current_value(&self) -> Option<T> { self.inner.lock().current.clone() }

  /// Delivers queued values and owed terminal events, one call at a time,
  /// never holding the lock across a subscriber call.
  fn drain(&self) {
    loop {
      let job = {
        let mut inner = self.inner.lock();
        let terminal = inner.terminal.clone();
        let mut job = None;
        for entry in inner.entries.iter_mut() {
          if entry.closed || entry.busy || entry.subscriber.is_none() {
            continue;
          }
          if let Some(value) = entry.pending.pop_front() {
            entry.busy = true;
            let subscriber = match entry.subscriber.take() {
              Some(s) => s,
              None => continue,
            };
            job = Some(Job::Value(entry.id, value, subscriber));
            break;
          }
          if let Some(completion) = terminal.clone() {
            entry.busy = true;
            entry.closed = true;
            let subscriber = match entry.subscriber.take() {
              Some(s) => s,
              None => continue,
            };
            job = Some(Job::Terminal(entry.id, completion, subscriber));
            break;
          }
        }
        if job.is_none() {
          inner.entries.retain(|e| !(e.closed && !e.busy));
        }
        job
      };

      match job {
        None => return,
        Some(Job::Value(id, value, mut subscriber)) => {
          let extra = subscriber.receive(value);
          let mut inner = self.inner.lock();
          if let Some(entry) =
            inner.entries.iter_mut().find(|e| e.id == id)
          {
            entry.busy = false;
            if !entry.closed {
              entry.demand += extra;
              entry.subscriber = Some(subscriber);
            }
          }
        }
        Some(Job::Terminal(id, completion, mut subscriber)) => {
          subscriber.receive_completion(completion);
          let mut inner = self.inner.lock();
          if let Some(entry) =
            inner.entries.iter_mut().find(|e| e.id == id)
          {
            entry.busy = false;
          }
        }
      }
    }
  }
}

enum Job<T, F> {
  Value(u64, T, BoxSubscriber<T, F>),
  Terminal(u64, Completion<F>, BoxSubscriber<T, F>),
}

/// Queues the retained current value for a subscriber that is still owed it
/// and has demand to pay for it.
fn replay_current<T, F>(entry: &mut Entry<T, F>, current: Option<T>) {
  if entry.needs_current && !entry.demand.is_none() {
    if let Some(value) = current {
      entry.demand.decrement();
      entry.pending.push_back(value);
      entry.needs_current = false;
    }
  }
}

struct SubjectSubscription<T, F> {
  core: SubjectCore<T, F>,
  id: u64,
}

impl<T, F> Subscription for SubjectSubscription<T, F>
where
  T: Clone + Send + 'static,
  F: Clone + Send + 'static,
{
  #[inline]
  fn request(&mut self, demand: Demand) { self.core.request(self.id, demand) }

  #[inline]
  fn cancel(&mut self) { self.core.cancel(self.id) }

  #[inline]
  fn is_closed(&self) -> bool { !self.core.is_active(self.id) }
}
