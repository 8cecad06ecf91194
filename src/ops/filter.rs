use crate::demand::Demand;
use crate::publisher::Publisher;
use crate::subscriber::{Completion, Subscriber};
use crate::subscription::BoxSubscription;

/// Drops values failing the predicate. Every dropped value grants one unit
/// of replacement demand upstream so the pipeline cannot stall.
#[derive(Clone)]
pub struct Filter<S, F> {
  pub(crate) source: S,
  pub(crate) predicate: F,
}

impl<S, F> Publisher for Filter<S, F>
where
  S: Publisher,
  F: FnMut(&S::Output) -> bool + Send + 'static,
{
  type Output = S::Output;
  type Failure = S::Failure;

  fn subscribe<Sub>(self, subscriber: Sub)
  where
    Sub: Subscriber<Input = S::Output, Failure = S::Failure> + Send + 'static,
  {
    self.source.subscribe(FilterSubscriber {
      downstream: subscriber,
      predicate: self.predicate,
    });
  }
}

struct FilterSubscriber<Sub, F> {
  downstream: Sub,
  predicate: F,
}

impl<Sub, F> Subscriber for FilterSubscriber<Sub, F>
where
  Sub: Subscriber,
  F: FnMut(&Sub::Input) -> bool + Send + 'static,
{
  type Input = Sub::Input;
  type Failure = Sub::Failure;

  #[inline]
  fn receive_subscription(&mut self, subscription: BoxSubscription) {
    self.downstream.receive_subscription(subscription)
  }

  fn receive(&mut self, input: Self::Input) -> Demand {
    if (self.predicate)(&input) {
      self.downstream.receive(input)
    } else {
      Demand::exact(1)
    }
  }

  #[inline]
  fn receive_completion(&mut self, completion: Completion<Self::Failure>) {
    self.downstream.receive_completion(completion)
  }
}
