//! Resubscribes to a fresh copy of the upstream when it fails.
//!
//! The downstream sees one continuous stream: its subscription survives
//! across attempts and undelivered demand carries over, so a value granted
//! before a failure can still arrive from the replacement attempt. Each
//! attempt gets its own generation; events from a superseded attempt are
//! ignored.

use crate::demand::Demand;
use crate::publisher::Publisher;
use crate::subscriber::{Completion, Subscriber};
use crate::subscription::{BoxSubscription, Subscription};
use crate::sync::Lock;

/// How many times a failed upstream is retried before the failure is let
/// through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryLimit {
  Count(usize),
  Unlimited,
}

impl From<usize> for RetryLimit {
  #[inline]
  fn from(count: usize) -> Self { RetryLimit::Count(count) }
}

#[derive(Clone)]
pub struct Retry<S> {
  pub(crate) source: S,
  pub(crate) limit: RetryLimit,
}

impl<S> Publisher for Retry<S>
where
  S: Publisher + Clone + Send + 'static,
{
  type Output = S::Output;
  type Failure = S::Failure;

  fn subscribe<Sub>(self, mut subscriber: Sub)
  where
    Sub: Subscriber<Input = S::Output, Failure = S::Failure> + Send + 'static,
  {
    let ctl = RetryCtl {
      inner: Lock::new(RetryBook {
        source: self.source,
        downstream: None,
        upstream: None,
        outstanding: Demand::none(),
        attempts: 0,
        limit: self.limit,
        generation: 0,
        closed: false,
      }),
    };
    subscriber.receive_subscription(Box::new(RetrySubscription {
      ctl: ctl.clone(),
    }));
    let source = {
      let mut book = ctl.inner.lock();
      if book.closed {
        return;
      }
      book.downstream = Some(subscriber);
      book.source.clone()
    };
    source.subscribe(Attempt { ctl, generation: 0 });
  }
}

struct RetryBook<S: Publisher, Sub> {
  source: S,
  downstream: Option<Sub>,
  upstream: Option<BoxSubscription>,
  /// Demand granted downstream but not yet satisfied; replayed to every
  /// new attempt.
  outstanding: Demand,
  attempts: usize,
  limit: RetryLimit,
  /// Bumped on each resubscription so a superseded attempt's late events
  /// can be told apart and dropped.
  generation: usize,
  closed: bool,
}

struct RetryCtl<S: Publisher, Sub> {
  inner: Lock<RetryBook<S, Sub>>,
}

impl<S: Publisher, Sub> Clone for RetryCtl<S, Sub> {
  #[inline]
  fn clone(&self) -> Self { Self { inner: self.inner.clone() } }
}

/// The one subscription the downstream holds for the whole retry run.
struct RetrySubscription<S: Publisher, Sub> {
  ctl: RetryCtl<S, Sub>,
}

impl<S, Sub> Subscription for RetrySubscription<S, Sub>
where
  S: Publisher + Clone + Send + 'static,
  Sub: Subscriber<Input = S::Output, Failure = S::Failure> + Send + 'static,
{
  fn request(&mut self, demand: Demand) {
    if demand.is_none() {
      return;
    }
    let (mut upstream, generation) = {
      let mut book = self.ctl.inner.lock();
      if book.closed {
        return;
      }
      book.outstanding += demand;
      match book.upstream.take() {
        Some(upstream) => (upstream, book.generation),
        // no live attempt right now; the demand waits in `outstanding`
        None => return,
      }
    };
    upstream.request(demand);
    let mut book = self.ctl.inner.lock();
    if book.closed || book.generation != generation || book.upstream.is_some()
    {
      drop(book);
      upstream.cancel();
    } else {
      book.upstream = Some(upstream);
    }
  }

  fn cancel(&mut self) {
    let upstream = {
      let mut book = self.ctl.inner.lock();
      if book.closed {
        return;
      }
      book.closed = true;
      book.downstream = None;
      book.upstream.take()
    };
    if let Some(mut upstream) = upstream {
      upstream.cancel();
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.ctl.inner.lock().closed }
}

/// Subscriber attached to one upstream attempt.
struct Attempt<S: Publisher, Sub> {
  ctl: RetryCtl<S, Sub>,
  generation: usize,
}

impl<S, Sub> Attempt<S, Sub>
where
  S: Publisher + Clone + Send + 'static,
  Sub: Subscriber<Input = S::Output, Failure = S::Failure> + Send + 'static,
{
  fn terminate(&self, completion: Completion<S::Failure>) {
    let downstream = {
      let mut book = self.ctl.inner.lock();
      if book.closed || book.generation != self.generation {
        return;
      }
      book.closed = true;
      book.upstream = None;
      book.downstream.take()
    };
    if let Some(mut downstream) = downstream {
      downstream.receive_completion(completion);
    }
  }
}

impl<S, Sub> Subscriber for Attempt<S, Sub>
where
  S: Publisher + Clone + Send + 'static,
  Sub: Subscriber<Input = S::Output, Failure = S::Failure> + Send + 'static,
{
  type Input = S::Output;
  type Failure = S::Failure;

  fn receive_subscription(&mut self, mut subscription: BoxSubscription) {
    let wanted = {
      let book = self.ctl.inner.lock();
      if book.closed || book.generation != self.generation {
        drop(book);
        subscription.cancel();
        return;
      }
      book.outstanding
    };
    if !wanted.is_none() {
      subscription.request(wanted);
    }
    let mut book = self.ctl.inner.lock();
    if book.closed
      || book.generation != self.generation
      || book.upstream.is_some()
    {
      drop(book);
      subscription.cancel();
    } else {
      book.upstream = Some(subscription);
    }
  }

  fn receive(&mut self, input: S::Output) -> Demand {
    let downstream = {
      let mut book = self.ctl.inner.lock();
      if book.closed || book.generation != self.generation {
        return Demand::none();
      }
      book.outstanding.decrement();
      book.downstream.take()
    };
    let mut downstream = match downstream {
      Some(d) => d,
      None => return Demand::none(),
    };
    let extra = downstream.receive(input);
    let mut book = self.ctl.inner.lock();
    if !book.closed && book.downstream.is_none() {
      book.downstream = Some(downstream);
      book.outstanding += extra;
    }
    extra
  }

  fn receive_completion(&mut self, completion: Completion<S::Failure>) {
    let failure = match completion {
      Completion::Finished => return self.terminate(Completion::Finished),
      Completion::Failed(f) => f,
    };
    let relaunch = {
      let mut book = self.ctl.inner.lock();
      if book.closed || book.generation != self.generation {
        return;
      }
      let again = match book.limit {
        RetryLimit::Unlimited => true,
        RetryLimit::Count(count) => book.attempts < count,
      };
      if again {
        book.attempts += 1;
        book.generation += 1;
        book.upstream = None;
        Some((book.source.clone(), book.generation))
      } else {
        None
      }
    };
    match relaunch {
      Some((source, generation)) => {
        source.subscribe(Attempt { ctl: self.ctl.clone(), generation })
      }
      None => self.terminate(Completion::Failed(failure)),
    }
  }
}
