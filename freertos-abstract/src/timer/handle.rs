use core::ffi::CStr;
use core::fmt;
use core::ptr;

use crate::FreeRtosError;
use crate::InterruptContext;
use crate::Ticks;
use crate::ffi::{BaseType_t, Pointee, TimerHandle_t};
use crate::shim::{
  pcTimerGetName,
  pdFALSE,
  pdPASS,
  xTimerChangePeriod,
  xTimerIsTimerActive,
  xTimerReset,
  xTimerStart,
  xTimerStartFromISR,
  xTimerStop,
  xTimerStopFromISR,
};

/// A handle for managing a timer.
///
/// See [`Timer`](crate::timer::Timer) for the preferred owned version.
///
/// This type is compatible with a raw FreeRTOS [`TimerHandle_t`].
#[repr(transparent)]
pub struct TimerHandle(Pointee<TimerHandle_t>);

impl fmt::Debug for TimerHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.as_ptr().fmt(f)
  }
}

/// Commands are accepted by the timer service, or time out waiting for room in its queue.
fn accepted(res: BaseType_t) -> Result<(), FreeRtosError> {
  match res {
    pdPASS => Ok(()),
    _ => Err(FreeRtosError::Timeout),
  }
}

impl TimerHandle {
  /// Create a `TimerHandle` from a raw handle.
  ///
  /// # Safety
  ///
  /// - `ptr` must point to a valid timer.
  /// - The timer must not be deleted for the lifetime `'a` of the returned `TimerHandle`.
  #[inline]
  pub const unsafe fn from_ptr<'a>(ptr: TimerHandle_t) -> &'a Self {
    debug_assert!(!ptr.is_null());
    &*ptr.cast()
  }

  /// Get the raw timer handle.
  #[inline]
  pub const fn as_ptr(&self) -> TimerHandle_t {
    ptr::addr_of!(self.0).cast_mut()
  }

  /// Get the timer's name if it has one.
  #[inline]
  pub fn name(&self) -> Option<&CStr> {
    unsafe {
      let timer_name = pcTimerGetName(self.as_ptr());
      if timer_name.is_null() {
        None
      } else {
        Some(CStr::from_ptr(timer_name))
      }
    }
  }

  /// Check if the timer is active.
  #[inline]
  pub fn is_active(&self) -> bool {
    unsafe { xTimerIsTimerActive(self.as_ptr()) != pdFALSE }
  }

  /// Start the timer, waiting at most `timeout` for the command to be accepted.
  #[inline]
  pub fn start(&self, timeout: impl Into<Ticks>) -> Result<(), FreeRtosError> {
    accepted(unsafe { xTimerStart(self.as_ptr(), timeout.into().into()) })
  }

  /// Start the timer from an interrupt service routine.
  #[inline]
  pub fn start_from_isr(&self, ic: &InterruptContext) -> Result<(), FreeRtosError> {
    accepted(unsafe { xTimerStartFromISR(self.as_ptr(), ic.as_ptr()) })
  }

  /// Stop the timer, waiting at most `timeout` for the command to be accepted.
  #[inline]
  pub fn stop(&self, timeout: impl Into<Ticks>) -> Result<(), FreeRtosError> {
    accepted(unsafe { xTimerStop(self.as_ptr(), timeout.into().into()) })
  }

  /// Stop the timer from an interrupt service routine.
  #[inline]
  pub fn stop_from_isr(&self, ic: &InterruptContext) -> Result<(), FreeRtosError> {
    accepted(unsafe { xTimerStopFromISR(self.as_ptr(), ic.as_ptr()) })
  }

  /// Restart the timer's period from now, starting it if it is stopped.
  #[inline]
  pub fn reset(&self, timeout: impl Into<Ticks>) -> Result<(), FreeRtosError> {
    accepted(unsafe { xTimerReset(self.as_ptr(), timeout.into().into()) })
  }

  /// Change the timer's period. This also starts the timer.
  #[inline]
  pub fn change_period(
    &self,
    new_period: impl Into<Ticks>,
    timeout: impl Into<Ticks>,
  ) -> Result<(), FreeRtosError> {
    accepted(unsafe { xTimerChangePeriod(self.as_ptr(), new_period.into().into(), timeout.into().into()) })
  }
}
