use crate::publisher::Publisher;
use crate::subscriber::Subscriber;

/// Creates a publisher that invokes `factory` once per subscription and
/// subscribes to the produced publisher. Combined with `retry`, every
/// attempt observes a fresh run of the factory.
pub fn deferred<Fac, P>(factory: Fac) -> Deferred<Fac>
where
  Fac: FnOnce() -> P,
  P: Publisher,
{
  Deferred(factory)
}

#[derive(Clone)]
pub struct Deferred<Fac>(Fac);

impl<Fac, P> Publisher for Deferred<Fac>
where
  Fac: FnOnce() -> P,
  P: Publisher,
{
  type Output = P::Output;
  type Failure = P::Failure;

  fn subscribe<S>(self, subscriber: S)
  where
    S: Subscriber<Input = Self::Output, Failure = Self::Failure>
      + Send
      + 'static,
  {
    (self.0)().subscribe(subscriber)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::publisher::PublisherExt;
  use crate::source::from_iter;
  use crate::sync::Lock;

  #[test]
  fn factory_runs_once_per_subscription() {
    let runs = Lock::new(0);
    let runs_c = runs.clone();
    let source = deferred(move || {
      *runs_c.lock() += 1;
      from_iter::<_, ()>(0..2)
    });

    source.clone().sink(|_| {});
    source.sink(|_| {});
    assert_eq!(*runs.lock(), 2);
  }
}
