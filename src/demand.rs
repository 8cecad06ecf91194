//! Demand: the currency of backpressure.
//!
//! A subscriber grants demand to its subscription; a publisher may deliver at
//! most the outstanding demand's worth of values. Demand is additive and
//! saturating, and "unbounded" is a distinct tag rather than a sentinel
//! integer, so `finite + unbounded` can never silently overflow.

use std::cmp::Ordering;
use std::ops::{Add, AddAssign};

/// Accumulated permission for a publisher to deliver further values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Demand {
  /// Permission for at most this many further deliveries.
  Finite(usize),
  /// Permission for any number of further deliveries.
  Unbounded,
}

impl Demand {
  /// No permission at all. Requesting it is always a no-op.
  #[inline]
  pub const fn none() -> Self { Demand::Finite(0) }

  /// Permission for exactly `n` further deliveries.
  #[inline]
  pub const fn exact(n: usize) -> Self { Demand::Finite(n) }

  #[inline]
  pub const fn unbounded() -> Self { Demand::Unbounded }

  #[inline]
  pub fn is_none(&self) -> bool { matches!(self, Demand::Finite(0)) }

  #[inline]
  pub fn is_unbounded(&self) -> bool { matches!(self, Demand::Unbounded) }

  /// Consumes one unit of demand. Saturates at zero; unbounded demand is
  /// never consumed.
  pub fn decrement(&mut self) {
    if let Demand::Finite(n) = self {
      *n = n.saturating_sub(1);
    }
  }
}

impl Default for Demand {
  #[inline]
  fn default() -> Self { Demand::none() }
}

impl Add for Demand {
  type Output = Demand;

  fn add(self, rhs: Demand) -> Demand {
    match (self, rhs) {
      (Demand::Finite(a), Demand::Finite(b)) => {
        Demand::Finite(a.saturating_add(b))
      }
      _ => Demand::Unbounded,
    }
  }
}

impl AddAssign for Demand {
  #[inline]
  fn add_assign(&mut self, rhs: Demand) { *self = *self + rhs; }
}

impl PartialOrd for Demand {
  #[inline]
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Demand {
  fn cmp(&self, other: &Self) -> Ordering {
    match (self, other) {
      (Demand::Finite(a), Demand::Finite(b)) => a.cmp(b),
      (Demand::Unbounded, Demand::Unbounded) => Ordering::Equal,
      (Demand::Unbounded, Demand::Finite(_)) => Ordering::Greater,
      (Demand::Finite(_), Demand::Unbounded) => Ordering::Less,
    }
  }
}

impl From<usize> for Demand {
  #[inline]
  fn from(n: usize) -> Self { Demand::Finite(n) }
}
