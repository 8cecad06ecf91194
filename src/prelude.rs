//! The one-stop import for building pipelines.

pub use crate::demand::Demand;
pub use crate::error::ProtocolViolation;
pub use crate::ops::flat_map::FlatMap;
pub use crate::ops::retry::RetryLimit;
pub use crate::ops::throttle::ThrottleMode;
pub use crate::publisher::{BoxPublisher, Publisher, PublisherExt};
#[cfg(feature = "pool-scheduler")]
pub use crate::scheduler::PoolScheduler;
pub use crate::scheduler::{
  Duration, Instant, Scheduler, TaskHandle, TestScheduler,
};
pub use crate::source::{
  deferred, empty, fail, from_iter, just, Deferred, Fail, Iter,
};
pub use crate::subject::{BehaviorSubject, Subject};
pub use crate::subscriber::{
  BoxSubscriber, Completion, Sink, SinkHandle, Subscriber,
};
pub use crate::subscription::{
  BoxSubscription, InertSubscription, Subscription, SubscriptionGuard,
  Teardown,
};
