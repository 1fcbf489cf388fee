//! Software timers.
//!
//! # Examples
//!
//! ```
//! use core::time::Duration;
//! use freertos_abstract::timer::Timer;
//!
//! let timer = Timer::build()
//!   .name("blink")
//!   .period(Duration::from_millis(10))
//!   .create(|timer| {
//!     let _ = timer.name();
//!   });
//!
//! timer.start(Duration::MAX).unwrap();
//! ```

use core::ffi::{c_void, CStr};
use core::fmt;

use alloc2::{boxed::Box, ffi::CString};

use crate::alloc::Storage;
use crate::assert::fatal;
use crate::ffi::TimerHandle_t;
use crate::shim::{
  pdFALSE,
  pdPASS,
  pdTRUE,
  portMAX_DELAY,
  pvTimerGetTimerID,
  xTimerDelete,
  xTimerPendFunctionCall,
  StaticTimer_t,
};
use crate::{FreeRtosError, InterruptContext, Ticks, WAIT_FOREVER};

mod builder;
pub use builder::TimerBuilder;
mod handle;
pub use handle::TimerHandle;

/// A software timer.
///
/// All operations on a timer are processed by the timer service task, which
/// receives them through a queue. The wait budget of every operation is the
/// time allowed for that queue to accept the command, not for the timer to
/// expire.
///
/// Dropping the timer deletes it.
#[must_use = "timer will be deleted immediately if unused"]
pub struct Timer {
  /// `None` once deleted.
  handle: Option<TimerHandle_t>,
  meta: *mut TimerMeta,
}

unsafe impl Send for Timer {}
unsafe impl Sync for Timer {}

/// Everything the kernel references until the timer service has processed
/// the deletion of the timer.
struct TimerMeta {
  callback: Box<dyn Fn(&TimerHandle) + Send>,
  id: usize,
  name: Option<CString>,
  #[cfg_attr(not(feature = "static_allocation"), allow(unused))]
  storage: Storage<StaticTimer_t>,
}

extern "C" fn timer_callback(ptr: TimerHandle_t) {
  unsafe {
    let handle = TimerHandle::from_ptr(ptr);
    let meta = &*pvTimerGetTimerID(ptr).cast::<TimerMeta>();
    (meta.callback)(handle);
  }
}

/// Runs on the timer service after the deletion of the timer was processed.
extern "C" fn free_meta(meta: *mut c_void, _: u32) {
  drop(unsafe { Box::from_raw(meta.cast::<TimerMeta>()) });
}

impl Timer {
  /// Create a new timer builder.
  pub fn build() -> TimerBuilder<'static> {
    TimerBuilder {
      name: None,
      period: Ticks::ZERO,
      auto_reload: true,
      id: 0,
    }
  }

  #[track_caller]
  fn create(
    name: Option<CString>,
    period: Ticks,
    auto_reload: bool,
    id: usize,
    callback: Box<dyn Fn(&TimerHandle) + Send>,
  ) -> Self {
    let meta = Box::into_raw(Box::new(TimerMeta { callback, id, name, storage: Storage::new() }));

    let name_ptr = unsafe { (*meta).name.as_deref().map_or(core::ptr::null(), CStr::as_ptr) };
    let auto_reload = if auto_reload { pdTRUE } else { pdFALSE };

    #[cfg(not(feature = "static_allocation"))]
    let handle = unsafe {
      crate::shim::xTimerCreate(name_ptr, period.into(), auto_reload as _, meta.cast(), Some(timer_callback))
    };

    #[cfg(feature = "static_allocation")]
    let handle = unsafe {
      crate::shim::xTimerCreateStatic(
        name_ptr,
        period.into(),
        auto_reload as _,
        meta.cast(),
        Some(timer_callback),
        (*meta).storage.as_mut_ptr(),
      )
    };

    if handle.is_null() {
      drop(unsafe { Box::from_raw(meta) });
      fatal("timer creation failed")
    }

    log::trace!("created timer {:p} with period {:?}", handle, period);
    Self { handle: Some(handle), meta }
  }

  fn handle(&self) -> Result<&TimerHandle, FreeRtosError> {
    match self.handle {
      Some(handle) => Ok(unsafe { TimerHandle::from_ptr(handle) }),
      None => Err(FreeRtosError::Unavailable),
    }
  }

  /// The identifier set with [`TimerBuilder::id`].
  pub fn id(&self) -> usize {
    unsafe { (*self.meta).id }
  }

  /// Get the timer's name if it has one.
  pub fn name(&self) -> Option<&CStr> {
    unsafe { (*self.meta).name.as_deref() }
  }

  /// Check if the timer is active. A deleted timer is never active.
  pub fn is_active(&self) -> bool {
    self.handle().map_or(false, TimerHandle::is_active)
  }

  /// Start the timer.
  ///
  /// # Errors
  ///
  /// [`FreeRtosError::Timeout`] if the command was not accepted in time,
  /// [`FreeRtosError::Unavailable`] if the timer was deleted.
  pub fn start(&self, timeout: impl Into<Ticks>) -> Result<(), FreeRtosError> {
    self.handle()?.start(timeout)
  }

  /// Stop the timer.
  ///
  /// # Errors
  ///
  /// See [`Timer::start`].
  pub fn stop(&self, timeout: impl Into<Ticks>) -> Result<(), FreeRtosError> {
    self.handle()?.stop(timeout)
  }

  /// Restart the timer's period from now.
  pub fn reset(&self, timeout: impl Into<Ticks>) -> Result<(), FreeRtosError> {
    self.handle()?.reset(timeout)
  }

  /// Change the timer's period. This also starts the timer.
  pub fn change_period(&self, new_period: impl Into<Ticks>, timeout: impl Into<Ticks>) -> Result<(), FreeRtosError> {
    self.handle()?.change_period(new_period, timeout)
  }

  /// Start the timer from an interrupt service routine.
  pub fn start_from_isr(&self, ic: &InterruptContext) -> Result<(), FreeRtosError> {
    self.handle()?.start_from_isr(ic)
  }

  /// Stop the timer from an interrupt service routine.
  pub fn stop_from_isr(&self, ic: &InterruptContext) -> Result<(), FreeRtosError> {
    self.handle()?.stop_from_isr(ic)
  }

  /// Delete the timer. Deleting it again does nothing.
  ///
  /// # Errors
  ///
  /// [`FreeRtosError::Timeout`] if the command was not accepted in time, in
  /// which case the timer still exists.
  pub fn delete(&mut self, timeout: impl Into<Ticks>) -> Result<(), FreeRtosError> {
    let Some(handle) = self.handle else {
      return Ok(())
    };

    if unsafe { xTimerDelete(handle, timeout.into().into()) } != pdPASS {
      return Err(FreeRtosError::Timeout)
    }
    self.handle = None;
    log::trace!("deleted timer {:p}", handle);

    // Commands are processed in order, so this runs after the deletion.
    if unsafe { xTimerPendFunctionCall(Some(free_meta), self.meta.cast(), 0, portMAX_DELAY) } != pdPASS {
      log::warn!("leaking the callback of timer {:p}", handle);
    }

    Ok(())
  }
}

impl fmt::Debug for Timer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Timer")
      .field("handle", &self.handle)
      .field("id", &self.id())
      .field("name", &self.name())
      .finish()
  }
}

impl Drop for Timer {
  fn drop(&mut self) {
    if self.delete(WAIT_FOREVER).is_err() {
      log::error!("failed to delete timer, leaking it");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  fn counting_timer(period: Duration, auto_reload: bool) -> (Timer, Arc<AtomicU32>) {
    let fired = Arc::new(AtomicU32::new(0));

    let timer = {
      let fired = Arc::clone(&fired);
      Timer::build()
        .name("counting")
        .period(period)
        .auto_reload(auto_reload)
        .id(7)
        .create(move |_| {
          fired.fetch_add(1, Ordering::SeqCst);
        })
    };

    (timer, fired)
  }

  #[test]
  fn one_shot_fires_once() {
    let (timer, fired) = counting_timer(Duration::from_millis(5), false);
    assert!(!timer.is_active());

    timer.start(Duration::MAX).unwrap();
    assert!(timer.is_active());

    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!timer.is_active());
  }

  #[test]
  fn auto_reload_fires_until_stopped() {
    let (timer, fired) = counting_timer(Duration::from_millis(5), true);
    timer.start(Duration::MAX).unwrap();

    std::thread::sleep(Duration::from_millis(50));
    timer.stop(Duration::MAX).unwrap();
    assert!(!timer.is_active());

    let stopped_at = fired.load(Ordering::SeqCst);
    assert!(stopped_at >= 2);

    std::thread::sleep(Duration::from_millis(30));
    assert!(fired.load(Ordering::SeqCst) <= stopped_at + 1);
  }

  #[test]
  fn reset_restarts_the_period() {
    let (timer, fired) = counting_timer(Duration::from_millis(40), false);
    timer.start(Duration::MAX).unwrap();

    for _ in 0..3 {
      std::thread::sleep(Duration::from_millis(20));
      timer.reset(Duration::MAX).unwrap();
    }
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn reset_starts_a_stopped_timer() {
    let (timer, fired) = counting_timer(Duration::from_millis(5), false);
    timer.reset(Duration::MAX).unwrap();
    assert!(timer.is_active());

    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn change_period_starts_with_the_new_period() {
    let (timer, fired) = counting_timer(Duration::from_secs(10), false);

    timer.change_period(Duration::from_millis(5), Duration::MAX).unwrap();
    assert!(timer.is_active());

    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn isr_start_and_stop() {
    let (timer, fired) = counting_timer(Duration::from_millis(5), true);

    {
      let ic = InterruptContext::new();
      timer.start_from_isr(&ic).unwrap();
    }
    assert!(timer.is_active());
    std::thread::sleep(Duration::from_millis(50));

    {
      let ic = InterruptContext::new();
      timer.stop_from_isr(&ic).unwrap();
    }
    assert!(!timer.is_active());
    assert!(fired.load(Ordering::SeqCst) >= 2);
  }

  #[test]
  fn isr_operations_on_a_deleted_timer() {
    let (mut timer, _) = counting_timer(Duration::from_millis(5), true);
    timer.delete(Duration::MAX).unwrap();

    let ic = InterruptContext::new();
    assert_eq!(timer.start_from_isr(&ic), Err(FreeRtosError::Unavailable));
    assert_eq!(timer.stop_from_isr(&ic), Err(FreeRtosError::Unavailable));
    assert_eq!(timer.reset(Duration::MAX), Err(FreeRtosError::Unavailable));
    assert_eq!(timer.change_period(Duration::from_millis(1), Duration::MAX), Err(FreeRtosError::Unavailable));
  }

  #[test]
  fn id_and_name() {
    let (timer, _) = counting_timer(Duration::from_millis(5), false);
    assert_eq!(timer.id(), 7);
    assert_eq!(timer.name().and_then(|name| name.to_str().ok()), Some("counting"));
  }

  #[test]
  fn delete_is_idempotent() {
    let (mut timer, _) = counting_timer(Duration::from_millis(5), true);
    timer.start(Duration::MAX).unwrap();

    timer.delete(Duration::MAX).unwrap();
    assert!(!timer.is_active());
    timer.delete(Duration::MAX).unwrap();
    assert_eq!(timer.start(Duration::MAX), Err(FreeRtosError::Unavailable));
  }

  #[test]
  fn callback_sees_its_handle() {
    let seen = Arc::new(AtomicU32::new(0));

    let timer = {
      let seen = Arc::clone(&seen);
      Timer::build()
        .name("handle")
        .period(Duration::from_millis(2))
        .auto_reload(false)
        .create(move |handle| {
          if handle.name().is_some() {
            seen.store(1, Ordering::SeqCst);
          }
        })
    };
    timer.start(Duration::MAX).unwrap();

    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
  }

  #[test]
  #[should_panic(expected = "timer creation failed")]
  fn zero_period_is_fatal() {
    let _ = Timer::build().create(|_| {});
  }
}
