//! Leaf publishers: where pipelines begin.

mod deferred;
mod fail;
mod from_iter;

pub use deferred::{deferred, Deferred};
pub use fail::{fail, Fail};
pub use from_iter::{empty, from_iter, just, Iter};
