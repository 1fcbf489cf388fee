use core::{fmt, ptr};

use crate::{
  alloc::Storage,
  assert::fatal,
  ffi::{Pointee, SemaphoreHandle_t, UBaseType_t},
  shim::{
    pdTRUE,
    uxSemaphoreGetCount,
    vSemaphoreDelete,
    xSemaphoreGive,
    xSemaphoreGiveFromISR,
    xSemaphoreTake,
    xSemaphoreTakeFromISR,
    StaticSemaphore_t,
  },
  InterruptContext,
  Ticks,
};

/// The single acquire/release implementation shared by mutexes and semaphores.
///
/// Callers map the `bool` results to their own error semantics.
#[repr(transparent)]
pub(crate) struct LockHandle(Pointee<SemaphoreHandle_t>);

impl fmt::Debug for LockHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.as_ptr().fmt(f)
  }
}

impl LockHandle {
  /// # Safety
  ///
  /// - `ptr` must point to a valid semaphore.
  /// - The semaphore must not be deleted for the lifetime `'a` of the returned `LockHandle`.
  #[inline]
  pub const unsafe fn from_ptr<'a>(ptr: SemaphoreHandle_t) -> &'a Self {
    debug_assert!(!ptr.is_null());
    &*ptr.cast()
  }

  #[inline]
  pub const fn as_ptr(&self) -> SemaphoreHandle_t {
    ptr::addr_of!(self.0).cast_mut()
  }

  #[inline]
  pub fn acquire(&self, timeout: Ticks) -> bool {
    unsafe { xSemaphoreTake(self.as_ptr(), timeout.into()) == pdTRUE }
  }

  #[inline]
  pub fn release(&self) -> bool {
    unsafe { xSemaphoreGive(self.as_ptr()) == pdTRUE }
  }

  #[inline]
  pub fn acquire_from_isr(&self, ic: &InterruptContext) -> bool {
    unsafe { xSemaphoreTakeFromISR(self.as_ptr(), ic.as_ptr()) == pdTRUE }
  }

  #[inline]
  pub fn release_from_isr(&self, ic: &InterruptContext) -> bool {
    unsafe { xSemaphoreGiveFromISR(self.as_ptr(), ic.as_ptr()) == pdTRUE }
  }

  #[inline]
  pub fn count(&self) -> UBaseType_t {
    unsafe { uxSemaphoreGetCount(self.as_ptr()) }
  }
}

/// Exclusive owner of one kernel semaphore handle.
pub(crate) struct RawLock {
  handle: SemaphoreHandle_t,
  // Referenced by the kernel until `handle` is deleted.
  _storage: Storage<StaticSemaphore_t>,
}

unsafe impl Send for RawLock {}
unsafe impl Sync for RawLock {}

impl RawLock {
  #[track_caller]
  fn from_created(kind: &str, handle: SemaphoreHandle_t, storage: Storage<StaticSemaphore_t>) -> Self {
    if handle.is_null() {
      fatal(kind)
    }

    log::trace!("created semaphore {:p}", handle);
    Self { handle, _storage: storage }
  }

  #[inline]
  pub fn handle(&self) -> &LockHandle {
    unsafe { LockHandle::from_ptr(self.handle) }
  }
}

#[cfg(not(feature = "static_allocation"))]
impl RawLock {
  #[track_caller]
  pub fn mutex() -> Self {
    use crate::shim::xSemaphoreCreateMutex;

    let handle = unsafe { xSemaphoreCreateMutex() };
    Self::from_created("mutex creation failed", handle, Storage::new())
  }

  #[track_caller]
  pub fn binary() -> Self {
    use crate::shim::xSemaphoreCreateBinary;

    let handle = unsafe { xSemaphoreCreateBinary() };
    Self::from_created("binary semaphore creation failed", handle, Storage::new())
  }

  #[track_caller]
  pub fn counting(initial: UBaseType_t, max: UBaseType_t) -> Self {
    use crate::shim::xSemaphoreCreateCounting;

    let handle = unsafe { xSemaphoreCreateCounting(max, initial) };
    Self::from_created("counting semaphore creation failed", handle, Storage::new())
  }
}

#[cfg(feature = "static_allocation")]
impl RawLock {
  #[track_caller]
  pub fn mutex() -> Self {
    use crate::shim::xSemaphoreCreateMutexStatic;

    let storage = Storage::new();
    let handle = unsafe { xSemaphoreCreateMutexStatic(storage.as_mut_ptr()) };
    Self::from_created("mutex creation failed", handle, storage)
  }

  #[track_caller]
  pub fn binary() -> Self {
    use crate::shim::xSemaphoreCreateBinaryStatic;

    let storage = Storage::new();
    let handle = unsafe { xSemaphoreCreateBinaryStatic(storage.as_mut_ptr()) };
    Self::from_created("binary semaphore creation failed", handle, storage)
  }

  #[track_caller]
  pub fn counting(initial: UBaseType_t, max: UBaseType_t) -> Self {
    use crate::shim::xSemaphoreCreateCountingStatic;

    let storage = Storage::new();
    let handle = unsafe { xSemaphoreCreateCountingStatic(max, initial, storage.as_mut_ptr()) };
    Self::from_created("counting semaphore creation failed", handle, storage)
  }
}

impl fmt::Debug for RawLock {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.handle.fmt(f)
  }
}

impl Drop for RawLock {
  fn drop(&mut self) {
    log::trace!("deleting semaphore {:p}", self.handle);
    unsafe { vSemaphoreDelete(self.handle) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn binary_starts_empty() {
    let lock = RawLock::binary();
    assert!(!lock.handle().acquire(Ticks::ZERO));
    assert!(lock.handle().release());
    assert!(!lock.handle().release());
    assert!(lock.handle().acquire(Ticks::ZERO));
  }

  #[test]
  fn counting_reports_count() {
    let lock = RawLock::counting(2, 3);
    assert_eq!(lock.handle().count(), 2);
    assert!(lock.handle().release());
    assert_eq!(lock.handle().count(), 3);
  }

  #[test]
  #[should_panic(expected = "counting semaphore creation failed")]
  fn invalid_counting_semaphore_is_fatal() {
    let _ = RawLock::counting(4, 2);
  }
}
