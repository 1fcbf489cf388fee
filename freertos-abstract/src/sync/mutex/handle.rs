use core::fmt;

use crate::{
  ffi::SemaphoreHandle_t,
  sync::lock::LockHandle,
  FreeRtosError,
  InterruptContext,
  Ticks,
};

/// A handle for managing a mutex.
///
/// See [`Mutex`](crate::sync::Mutex) for the preferred owned version.
///
/// This type is compatible with a raw FreeRTOS [`SemaphoreHandle_t`] created as a mutex.
#[repr(transparent)]
pub struct MutexHandle(LockHandle);

impl fmt::Debug for MutexHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

impl MutexHandle {
  /// Create a `MutexHandle` from a raw handle.
  ///
  /// # Safety
  ///
  /// - `ptr` must point to a valid mutex.
  /// - The mutex must not be deleted for the lifetime `'a` of the returned `MutexHandle`.
  #[inline]
  pub unsafe fn from_ptr<'a>(ptr: SemaphoreHandle_t) -> &'a Self {
    &*(LockHandle::from_ptr(ptr) as *const LockHandle).cast()
  }

  /// Get the raw mutex handle.
  #[inline]
  pub const fn as_ptr(&self) -> SemaphoreHandle_t {
    self.0.as_ptr()
  }

  /// Lock the mutex, waiting at most `timeout`.
  #[inline]
  pub fn lock(&self, timeout: impl Into<Ticks>) -> Result<(), FreeRtosError> {
    if self.0.acquire(timeout.into()) {
      Ok(())
    } else {
      Err(FreeRtosError::Timeout)
    }
  }

  /// Unlock the mutex.
  ///
  /// # Errors
  ///
  /// Fails with [`FreeRtosError::NotLocked`] if the calling task does not hold the mutex.
  #[inline]
  pub fn unlock(&self) -> Result<(), FreeRtosError> {
    if self.0.release() {
      Ok(())
    } else {
      Err(FreeRtosError::NotLocked)
    }
  }

  /// Lock the mutex from within an interrupt service routine.
  #[inline]
  pub fn lock_from_isr(&self, ic: &InterruptContext) -> Result<(), FreeRtosError> {
    if self.0.acquire_from_isr(ic) {
      Ok(())
    } else {
      Err(FreeRtosError::Unavailable)
    }
  }

  /// Unlock the mutex from within an interrupt service routine.
  #[inline]
  pub fn unlock_from_isr(&self, ic: &InterruptContext) -> Result<(), FreeRtosError> {
    if self.0.release_from_isr(ic) {
      Ok(())
    } else {
      Err(FreeRtosError::NotLocked)
    }
  }

  /// Lock the mutex and return a guard which unlocks it when dropped.
  pub fn guard(&self, timeout: impl Into<Ticks>) -> Result<MutexGuard<'_>, FreeRtosError> {
    self.lock(timeout)?;
    Ok(MutexGuard { handle: self })
  }
}

/// An RAII implementation of a “scoped lock” of a mutex.
///
/// When this structure is dropped (falls out of scope), the mutex is unlocked.
#[must_use = "if unused the `Mutex` will unlock immediately"]
#[clippy::has_significant_drop]
#[derive(Debug)]
pub struct MutexGuard<'m> {
  handle: &'m MutexHandle,
}

impl Drop for MutexGuard<'_> {
  fn drop(&mut self) {
    if self.handle.unlock().is_err() {
      log::warn!("mutex {:p} was not held by its guard", self.handle.as_ptr());
    }
  }
}
