//! Time source for cache decisions and fetch timestamps.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

pub const MILLIS_PER_MINUTE: i64 = 60_000;

pub trait Clock: Send + Sync {
  fn now(&self) -> Timestamp;
}

/// Wall clock backed by `chrono::Utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> Timestamp {
    Utc::now().timestamp_millis()
  }
}

/// Settable clock for deterministic tests and replays.
///
/// Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
  now: Arc<AtomicI64>,
}

impl ManualClock {
  pub fn new(start: Timestamp) -> Self {
    Self {
      now: Arc::new(AtomicI64::new(start)),
    }
  }

  pub fn set(&self, at: Timestamp) {
    self.now.store(at, Ordering::SeqCst);
  }

  pub fn advance_millis(&self, millis: i64) {
    self.now.fetch_add(millis, Ordering::SeqCst);
  }

  pub fn advance_secs(&self, secs: i64) {
    self.advance_millis(secs * 1_000);
  }
}

impl Clock for ManualClock {
  fn now(&self) -> Timestamp {
    self.now.load(Ordering::SeqCst)
  }
}
