use core::fmt;
use core::ops::Deref;

use super::lock::RawLock;

mod handle;
pub use handle::{MutexGuard, MutexHandle};

/// A mutual exclusion primitive.
///
/// Unlike [`std::sync::Mutex`] this does not wrap any data, it only owns the
/// kernel mutex. Use [`MutexHandle::guard`] to unlock it automatically.
///
/// # Examples
///
/// ```
/// use core::time::Duration;
/// use freertos_abstract::sync::Mutex;
///
/// let mutex = Mutex::new();
///
/// mutex.lock(Duration::MAX).unwrap();
/// // ...
/// mutex.unlock().unwrap();
///
/// {
///   let _guard = mutex.guard(Duration::from_millis(10)).unwrap();
///   // ...
/// }
/// ```
pub struct Mutex {
  lock: RawLock,
}

impl Mutex {
  /// Create a new, unlocked mutex.
  ///
  /// Failing to create the kernel mutex is fatal.
  #[track_caller]
  pub fn new() -> Self {
    Self { lock: RawLock::mutex() }
  }
}

impl Default for Mutex {
  #[track_caller]
  fn default() -> Self {
    Self::new()
  }
}

impl Deref for Mutex {
  type Target = MutexHandle;

  #[inline]
  fn deref(&self) -> &Self::Target {
    unsafe { MutexHandle::from_ptr(self.lock.handle().as_ptr()) }
  }
}

impl fmt::Debug for Mutex {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Mutex").field("handle", &self.lock).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use core::time::Duration;
  use std::sync::Arc;
  use std::thread;

  use crate::{FreeRtosError, InterruptContext};

  #[test]
  fn lock_unlock() {
    let mutex = Mutex::new();
    mutex.lock(Duration::ZERO).unwrap();
    assert_eq!(mutex.lock(Duration::ZERO), Err(FreeRtosError::Timeout));
    mutex.unlock().unwrap();
    mutex.lock(Duration::ZERO).unwrap();
    mutex.unlock().unwrap();
  }

  #[test]
  fn isr_lock_and_unlock() {
    let mutex = Mutex::new();
    let ic = InterruptContext::new();

    mutex.lock_from_isr(&ic).unwrap();
    assert_eq!(mutex.lock_from_isr(&ic), Err(FreeRtosError::Unavailable));
    assert_eq!(mutex.lock(Duration::ZERO), Err(FreeRtosError::Timeout));

    mutex.unlock_from_isr(&ic).unwrap();
    assert_eq!(mutex.unlock_from_isr(&ic), Err(FreeRtosError::NotLocked));

    mutex.lock(Duration::ZERO).unwrap();
    mutex.unlock().unwrap();
  }

  #[test]
  fn unlocking_an_unlocked_mutex_fails() {
    let mutex = Mutex::new();
    assert_eq!(mutex.unlock(), Err(FreeRtosError::NotLocked));
  }

  #[test]
  fn guard_unlocks_on_drop() {
    let mutex = Mutex::new();
    {
      let _guard = mutex.guard(Duration::ZERO).unwrap();
      assert!(mutex.guard(Duration::ZERO).is_err());
    }
    assert!(mutex.guard(Duration::ZERO).is_ok());
  }

  #[test]
  fn lock_times_out_while_held_elsewhere() {
    let mutex = Arc::new(Mutex::new());
    mutex.lock(Duration::MAX).unwrap();

    let contender = {
      let mutex = Arc::clone(&mutex);
      thread::spawn(move || mutex.lock(Duration::from_millis(20)))
    };
    assert_eq!(contender.join().unwrap(), Err(FreeRtosError::Timeout));

    mutex.unlock().unwrap();
  }
}
