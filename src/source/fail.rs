use std::marker::PhantomData;

use crate::publisher::Publisher;
use crate::subscriber::{Completion, Subscriber};
use crate::subscription::InertSubscription;

/// Creates a publisher that fails immediately on subscription, before any
/// demand is requested. It emits no values, only the terminal failure.
pub fn fail<T, F>(failure: F) -> Fail<T, F> {
  Fail { failure, _output: PhantomData }
}

pub struct Fail<T, F> {
  failure: F,
  _output: PhantomData<fn() -> T>,
}

impl<T, F: Clone> Clone for Fail<T, F> {
  fn clone(&self) -> Self {
    Self { failure: self.failure.clone(), _output: PhantomData }
  }
}

impl<T, F> Publisher for Fail<T, F>
where
  T: Send + 'static,
  F: Send + 'static,
{
  type Output = T;
  type Failure = F;

  fn subscribe<S>(self, mut subscriber: S)
  where
    S: Subscriber<Input = T, Failure = F> + Send + 'static,
  {
    subscriber.receive_subscription(Box::new(InertSubscription));
    subscriber.receive_completion(Completion::Failed(self.failure));
  }
}
