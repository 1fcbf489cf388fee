use core::time::Duration;

use crate::shim::{configTICK_RATE_HZ, portMAX_DELAY};
use crate::ffi::TickType_t;

/// Wait budget which blocks until the operation completes.
pub const WAIT_FOREVER: Ticks = Ticks::new(portMAX_DELAY);

/// Duration in kernel ticks.
///
/// The duration of a single tick depends on `configTICK_RATE_HZ`.
///
/// All blocking API functions accept anything which can be converted to
/// `Ticks`. In particular, a [`Duration`] can be passed with the following
/// behaviour:
///
/// - `Duration::ZERO` makes an API call non-blocking and it will return immediately.
/// - `Duration::MAX` blocks an API call until it completes.
/// - Any other duration is rounded down to whole ticks and saturates just below
///   `portMAX_DELAY`, so a finite duration never means "forever".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Ticks {
  ticks: TickType_t,
}

impl Ticks {
  /// No wait at all.
  pub const ZERO: Self = Self::new(0);

  /// Create `Ticks` from raw ticks.
  pub const fn new(ticks: TickType_t) -> Self {
    Self { ticks }
  }

  /// Create `Ticks` from milliseconds, like `pdMS_TO_TICKS`.
  pub const fn from_millis(ms: u32) -> Self {
    let ticks = ms as u64 * configTICK_RATE_HZ as u64 / 1000;
    Self::new(Self::saturate(ticks))
  }

  /// Get the raw tick count.
  pub const fn as_ticks(&self) -> TickType_t {
    self.ticks
  }

  /// Convert to milliseconds.
  pub const fn as_millis(&self) -> u64 {
    self.ticks as u64 * 1000 / configTICK_RATE_HZ as u64
  }

  /// Whether this is the wait-forever sentinel.
  pub const fn is_forever(&self) -> bool {
    self.ticks == portMAX_DELAY
  }

  const fn saturate(ticks: u64) -> TickType_t {
    if ticks >= portMAX_DELAY as u64 {
      portMAX_DELAY - 1
    } else {
      ticks as TickType_t
    }
  }
}

impl From<Ticks> for TickType_t {
  fn from(ticks: Ticks) -> Self {
    ticks.ticks
  }
}

impl From<TickType_t> for Ticks {
  fn from(ticks: TickType_t) -> Self {
    Self::new(ticks)
  }
}

impl From<Duration> for Ticks {
  fn from(duration: Duration) -> Self {
    if duration == Duration::MAX {
      return WAIT_FOREVER
    }

    let ticks = duration.as_millis() * configTICK_RATE_HZ as u128 / 1000;
    Self::new(Self::saturate(ticks.try_into().unwrap_or(u64::MAX)))
  }
}

impl From<Ticks> for Duration {
  fn from(ticks: Ticks) -> Self {
    Duration::from_millis(ticks.as_millis())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn duration_max_is_forever() {
    assert_eq!(Ticks::from(Duration::MAX), WAIT_FOREVER);
    assert!(Ticks::from(Duration::MAX).is_forever());
  }

  #[test]
  fn finite_durations_never_wait_forever() {
    let huge = Duration::from_secs(u64::MAX / 2);
    assert!(!Ticks::from(huge).is_forever());
    assert_eq!(Ticks::from(huge).as_ticks(), portMAX_DELAY - 1);
  }

  #[test]
  fn zero_is_no_wait() {
    assert_eq!(Ticks::from(Duration::ZERO), Ticks::ZERO);
  }

  #[test]
  fn millis_follow_tick_rate() {
    let ticks = Ticks::from_millis(1500);
    assert_eq!(ticks.as_ticks(), 1500 * configTICK_RATE_HZ / 1000);
    assert_eq!(Duration::from(ticks), Duration::from_millis(1500));
  }
}
