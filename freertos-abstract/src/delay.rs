use embedded_hal::blocking::delay::{DelayMs, DelayUs};

use crate::ffi::TickType_t;
use crate::shim::{vTaskDelay, vTaskDelayUntil, xTaskGetTickCount};
use crate::Ticks;

/// Block the calling task for at least `duration`.
///
/// A zero duration only yields.
#[inline]
pub fn delay(duration: impl Into<Ticks>) {
  unsafe { vTaskDelay(duration.into().into()) }
}

/// Blocking delay for drivers written against `embedded-hal`.
///
/// Microsecond delays are rounded up to whole ticks.
#[derive(Debug, Default, Clone, Copy)]
#[non_exhaustive]
pub struct Delay;

impl Delay {
  /// Create a new delay provider.
  pub const fn new() -> Self {
    Self
  }
}

impl DelayMs<u32> for Delay {
  fn delay_ms(&mut self, ms: u32) {
    delay(Ticks::from_millis(ms))
  }
}

impl DelayMs<u16> for Delay {
  fn delay_ms(&mut self, ms: u16) {
    delay(Ticks::from_millis(ms.into()))
  }
}

impl DelayMs<u8> for Delay {
  fn delay_ms(&mut self, ms: u8) {
    delay(Ticks::from_millis(ms.into()))
  }
}

impl DelayUs<u32> for Delay {
  fn delay_us(&mut self, us: u32) {
    delay(Ticks::from_millis(us.div_ceil(1000)))
  }
}

/// Drift-free periodic waiting.
///
/// Remembers the tick count of the last wake-up, so time spent working between
/// two calls to [`wait`](TimerDelay::wait) is not added to the period.
///
/// # Examples
///
/// ```
/// use core::time::Duration;
/// use freertos_abstract::TimerDelay;
///
/// let mut delay = TimerDelay::new(true);
///
/// for _ in 0..3 {
///   // Do the periodic work ...
///   delay.wait(Duration::from_millis(5));
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TimerDelay {
  last_wake: TickType_t,
}

impl TimerDelay {
  /// Create a new periodic delay.
  ///
  /// With `start` the reference time is now, otherwise it starts at tick zero
  /// until [`reset`](TimerDelay::reset) is called.
  pub fn new(start: bool) -> Self {
    let mut delay = Self { last_wake: 0 };
    if start {
      delay.reset();
    }
    delay
  }

  /// Set the reference time to the current tick count.
  #[inline]
  pub fn reset(&mut self) {
    self.last_wake = unsafe { xTaskGetTickCount() };
  }

  /// Block until `period` after the last wake-up and advance the reference
  /// time by exactly `period`.
  ///
  /// Returns immediately if that point in time has already passed.
  #[inline]
  pub fn wait(&mut self, period: impl Into<Ticks>) {
    unsafe { vTaskDelayUntil(&mut self.last_wake, period.into().into()) }
  }

  /// The reference time of the next [`wait`](TimerDelay::wait).
  #[inline]
  pub fn last_wake(&self) -> Ticks {
    self.last_wake.into()
  }
}
