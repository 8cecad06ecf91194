//! Operator publishers. Each operator is a publisher wrapping its upstream
//! and, per subscription, a fresh state machine subscribed to it.

pub mod combine_latest;
pub mod debounce;
pub mod filter;
pub mod flat_map;
pub mod map;
pub mod retry;
pub mod throttle;
pub mod zip;
