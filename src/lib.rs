//! Demand-driven reactive pipelines.
//!
//! A [`Publisher`](crate::publisher::Publisher) describes a stream of
//! values; subscribing materializes a per-subscription state machine that
//! delivers values only as the subscriber grants demand, followed by
//! exactly one terminal [`Completion`](crate::subscriber::Completion).
//! Operators compose structurally, so a whole pipeline is a single type
//! and the per-value path is static dispatch.
//!
//! ```
//! use wellspring::prelude::*;
//!
//! let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
//! let seen_c = seen.clone();
//!
//! from_iter::<_, ()>(0..10)
//!   .filter(|v| v % 2 == 0)
//!   .map(|v| v * v)
//!   .sink(move |v| seen_c.lock().unwrap().push(v));
//!
//! assert_eq!(*seen.lock().unwrap(), vec![0, 4, 16, 36, 64]);
//! ```
//!
//! Time-gated operators (`debounce`, `throttle`) take a
//! [`Scheduler`](crate::scheduler::Scheduler); tests drive them with the
//! virtual-time [`TestScheduler`](crate::scheduler::TestScheduler), and
//! the `pool-scheduler` feature (on by default) provides a wall-clock
//! `PoolScheduler` backed by a shared thread pool.

pub mod demand;
mod error;
pub(crate) mod gate;
pub mod ops;
pub mod prelude;
pub mod publisher;
pub mod scheduler;
pub mod source;
pub mod subject;
pub mod subscriber;
pub mod subscription;
pub(crate) mod sync;

pub use prelude::*;
