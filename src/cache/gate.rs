//! TTL evaluation and cache policy.

use crate::clock::{Timestamp, MILLIS_PER_MINUTE};
use crate::config::CachingConfig;

/// Whole minutes elapsed between `last_fetch` and `now`, truncated toward zero.
pub fn elapsed_minutes(last_fetch: Timestamp, now: Timestamp) -> i64 {
  (now - last_fetch) / MILLIS_PER_MINUTE
}

/// Decide whether a fetch is allowed.
///
/// A resource that was never fetched is always fetched. Otherwise the fetch is
/// allowed once the elapsed whole minutes reach the TTL (inclusive). A TTL of
/// zero or below disables caching.
pub fn should_fetch(last_fetch: Option<Timestamp>, ttl_minutes: i64, now: Timestamp) -> bool {
  if ttl_minutes <= 0 {
    return true;
  }

  match last_fetch {
    None => true,
    Some(last) => elapsed_minutes(last, now) >= ttl_minutes,
  }
}

/// The slice of resource status the gate looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchStatus {
  pub last_fetch: Option<Timestamp>,
  pub loading: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
  /// Cached data is younger than the TTL
  Fresh,
  /// A fetch for the resource is already outstanding
  InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
  Fetch,
  Suppress(SuppressReason),
}

/// Process-wide cache policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
  pub default_ttl_minutes: i64,
  pub dedupe_in_flight: bool,
}

impl CachePolicy {
  pub fn new(default_ttl_minutes: i64) -> Self {
    Self {
      default_ttl_minutes,
      dedupe_in_flight: true,
    }
  }

  /// Allow concurrent fetches of a never-fetched resource.
  pub fn without_in_flight_dedupe(mut self) -> Self {
    self.dedupe_in_flight = false;
    self
  }

  /// Caller override first, then the configured default.
  pub fn resolve_ttl(&self, ttl_override: Option<i64>) -> i64 {
    ttl_override.unwrap_or(self.default_ttl_minutes)
  }

  pub fn evaluate(&self, status: FetchStatus, ttl_override: Option<i64>, now: Timestamp) -> Verdict {
    if self.dedupe_in_flight && status.loading {
      return Verdict::Suppress(SuppressReason::InFlight);
    }

    let ttl = self.resolve_ttl(ttl_override);
    if should_fetch(status.last_fetch, ttl, now) {
      Verdict::Fetch
    } else {
      Verdict::Suppress(SuppressReason::Fresh)
    }
  }
}

impl From<&CachingConfig> for CachePolicy {
  fn from(config: &CachingConfig) -> Self {
    Self {
      default_ttl_minutes: config.ttl_minutes,
      dedupe_in_flight: config.dedupe_in_flight,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const NOW: Timestamp = 1_700_000_000_000;

  fn minutes_ago(minutes: i64) -> Option<Timestamp> {
    Some(NOW - minutes * MILLIS_PER_MINUTE)
  }

  #[test]
  fn test_never_fetched_always_fetches() {
    for ttl in [1, 5, 60, 10_000] {
      assert!(should_fetch(None, ttl, NOW));
    }
  }

  #[test]
  fn test_inside_window_suppresses() {
    for ttl in [1, 2, 10, 90] {
      assert!(!should_fetch(minutes_ago(ttl - 1), ttl, NOW));
    }
  }

  #[test]
  fn test_boundary_is_inclusive() {
    for ttl in [1, 2, 10, 90] {
      assert!(should_fetch(minutes_ago(ttl), ttl, NOW));
    }
  }

  #[test]
  fn test_fractional_minutes_below_ttl_suppress() {
    // 59.999 seconds with a one minute TTL
    assert!(!should_fetch(Some(NOW - 59_999), 1, NOW));
    // 61 seconds rounds down to one whole minute
    assert!(should_fetch(Some(NOW - 61_000), 1, NOW));
    // 1m59s is still one whole minute
    assert!(!should_fetch(Some(NOW - 119_000), 2, NOW));
  }

  #[test]
  fn test_non_positive_ttl_never_caches() {
    for ttl in [0, -1, -30] {
      assert!(should_fetch(None, ttl, NOW));
      assert!(should_fetch(Some(NOW), ttl, NOW));
      assert!(should_fetch(minutes_ago(-5), ttl, NOW));
    }
  }

  #[test]
  fn test_resolve_ttl_prefers_override() {
    let policy = CachePolicy::new(10);
    assert_eq!(policy.resolve_ttl(None), 10);
    assert_eq!(policy.resolve_ttl(Some(3)), 3);
    assert_eq!(policy.resolve_ttl(Some(0)), 0);
  }

  #[test]
  fn test_evaluate_in_flight() {
    let status = FetchStatus {
      last_fetch: None,
      loading: true,
    };

    let policy = CachePolicy::new(1);
    assert_eq!(
      policy.evaluate(status, None, NOW),
      Verdict::Suppress(SuppressReason::InFlight)
    );

    let racy = policy.without_in_flight_dedupe();
    assert_eq!(racy.evaluate(status, None, NOW), Verdict::Fetch);
  }

  #[test]
  fn test_evaluate_uses_override() {
    let status = FetchStatus {
      last_fetch: minutes_ago(3),
      loading: false,
    };
    let policy = CachePolicy::new(5);

    assert_eq!(
      policy.evaluate(status, None, NOW),
      Verdict::Suppress(SuppressReason::Fresh)
    );
    assert_eq!(policy.evaluate(status, Some(2), NOW), Verdict::Fetch);
    assert_eq!(policy.evaluate(status, Some(0), NOW), Verdict::Fetch);
  }
}
