use core::fmt;

use crate::{
  ffi::SemaphoreHandle_t,
  sync::lock::LockHandle,
  FreeRtosError,
  InterruptContext,
  Ticks,
};

use super::SemaphoreGuard;

/// A handle for managing a binary or counting semaphore.
///
/// See [`BinarySemaphore`](crate::sync::BinarySemaphore) and
/// [`CountingSemaphore`](crate::sync::CountingSemaphore) for the preferred owned versions.
///
/// This type is compatible with a raw FreeRTOS [`SemaphoreHandle_t`].
#[repr(transparent)]
pub struct SemaphoreHandle(LockHandle);

impl fmt::Debug for SemaphoreHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

impl SemaphoreHandle {
  /// Create a `SemaphoreHandle` from a raw handle.
  ///
  /// # Safety
  ///
  /// - `ptr` must point to a valid semaphore.
  /// - The semaphore must not be deleted for the lifetime `'a` of the returned `SemaphoreHandle`.
  #[inline]
  pub unsafe fn from_ptr<'a>(ptr: SemaphoreHandle_t) -> &'a Self {
    &*(LockHandle::from_ptr(ptr) as *const LockHandle).cast()
  }

  /// Get the raw semaphore handle.
  #[inline]
  pub const fn as_ptr(&self) -> SemaphoreHandle_t {
    self.0.as_ptr()
  }

  /// Increment the semaphore.
  ///
  /// # Errors
  ///
  /// Fails with [`FreeRtosError::QueueFull`] if the semaphore is already at its maximum count.
  #[inline]
  pub fn give(&self) -> Result<(), FreeRtosError> {
    if self.0.release() {
      Ok(())
    } else {
      Err(FreeRtosError::QueueFull)
    }
  }

  /// Increment the semaphore from within an interrupt service routine.
  #[inline]
  pub fn give_from_isr(&self, ic: &InterruptContext) -> Result<(), FreeRtosError> {
    if self.0.release_from_isr(ic) {
      Ok(())
    } else {
      Err(FreeRtosError::QueueFull)
    }
  }

  /// Decrement the semaphore, waiting at most `timeout`.
  #[inline]
  pub fn take(&self, timeout: impl Into<Ticks>) -> Result<(), FreeRtosError> {
    if self.0.acquire(timeout.into()) {
      Ok(())
    } else {
      Err(FreeRtosError::Timeout)
    }
  }

  /// Decrement the semaphore from within an interrupt service routine.
  #[inline]
  pub fn take_from_isr(&self, ic: &InterruptContext) -> Result<(), FreeRtosError> {
    if self.0.acquire_from_isr(ic) {
      Ok(())
    } else {
      Err(FreeRtosError::Unavailable)
    }
  }

  /// Take this semaphore in RAII fashion.
  pub fn lock(&self, timeout: impl Into<Ticks>) -> Result<SemaphoreGuard<'_>, FreeRtosError> {
    self.take(timeout)?;

    Ok(SemaphoreGuard { handle: self })
  }

  #[inline]
  pub(crate) fn is_given(&self) -> bool {
    self.0.count() > 0
  }
}
