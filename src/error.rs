//! Protocol misuse detection.
//!
//! Data-flow failures travel through the typed `Failure` channel of a
//! pipeline. Misuse of the protocol itself is a different beast: it is a
//! programmer error, never part of the failure channel. Conforming stages
//! detect it, report it through `tracing` and reject the offending call.

use thiserror::Error;

/// A violation of the publisher/subscriber contract.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ProtocolViolation {
  /// A value or completion was delivered to a subscriber before
  /// `receive_subscription`.
  #[error("value delivered before any subscription was received")]
  MissingSubscription,
  /// `receive_subscription` was called on a subscriber that is already
  /// attached to a subscription.
  #[error("subscriber is already attached to a subscription")]
  DuplicateSubscription,
}

/// Reports a violation and leaves the stream state untouched; the offending
/// call is dropped by the caller. Debug builds panic instead so the misuse
/// surfaces at its call site during development.
pub(crate) fn report(violation: ProtocolViolation) {
  tracing::error!(%violation, "reactive protocol violated");
  if cfg!(debug_assertions) {
    panic!("reactive protocol violated: {violation}");
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn violations_render_distinct_messages() {
    assert_ne!(
      ProtocolViolation::MissingSubscription.to_string(),
      ProtocolViolation::DuplicateSubscription.to_string()
    );
  }

  #[cfg(debug_assertions)]
  #[test]
  #[should_panic(expected = "reactive protocol violated")]
  fn report_panics_in_debug_builds() {
    report(ProtocolViolation::MissingSubscription);
  }
}
