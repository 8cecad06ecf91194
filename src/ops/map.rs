use std::marker::PhantomData;

use crate::demand::Demand;
use crate::publisher::Publisher;
use crate::subscriber::{Completion, Subscriber};
use crate::subscription::BoxSubscription;

/// Transforms every upstream value. Demand passes through untouched: the
/// downstream subscription is the upstream one.
#[derive(Clone)]
pub struct Map<S, F> {
  pub(crate) source: S,
  pub(crate) f: F,
}

impl<S, F, Out> Publisher for Map<S, F>
where
  S: Publisher,
  F: FnMut(S::Output) -> Out + Send + 'static,
  Out: Send + 'static,
{
  type Output = Out;
  type Failure = S::Failure;

  fn subscribe<Sub>(self, subscriber: Sub)
  where
    Sub: Subscriber<Input = Out, Failure = S::Failure> + Send + 'static,
  {
    self
      .source
      .subscribe(MapSubscriber {
        downstream: subscriber,
        f: self.f,
        _in: PhantomData,
      });
  }
}

struct MapSubscriber<In, Sub, F> {
  downstream: Sub,
  f: F,
  _in: PhantomData<fn(In)>,
}

impl<In, Out, Sub, F> Subscriber for MapSubscriber<In, Sub, F>
where
  In: Send + 'static,
  Sub: Subscriber<Input = Out>,
  F: FnMut(In) -> Out + Send + 'static,
{
  type Input = In;
  type Failure = Sub::Failure;

  #[inline]
  fn receive_subscription(&mut self, subscription: BoxSubscription) {
    self.downstream.receive_subscription(subscription)
  }

  #[inline]
  fn receive(&mut self, input: In) -> Demand {
    self.downstream.receive((self.f)(input))
  }

  #[inline]
  fn receive_completion(&mut self, completion: Completion<Self::Failure>) {
    self.downstream.receive_completion(completion)
  }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;
  use crate::sync::Lock;

  #[test]
  fn maps_values_in_order() {
    let seen = Lock::new(Vec::new());
    let seen_c = seen.clone();
    from_iter::<_, ()>(1..=3)
      .map(|v| v * 10)
      .sink(move |v| seen_c.lock().push(v));
    assert_eq!(*seen.lock(), vec![10, 20, 30]);
  }
}
