use core::fmt;
use core::ops::Deref;

mod guard;
pub use guard::SemaphoreGuard;
mod handle;
pub use handle::SemaphoreHandle;

use super::lock::RawLock;
use crate::assert::fatal;
use crate::ffi::UBaseType_t;

/// A binary semaphore.
///
/// A freshly created binary semaphore is empty: it has to be given before it
/// can be taken.
///
/// # Example
///
/// ```
/// use core::time::Duration;
/// use freertos_abstract::sync::BinarySemaphore;
///
/// let semaphore = BinarySemaphore::new();
/// assert!(semaphore.take(Duration::ZERO).is_err());
///
/// semaphore.give().unwrap();
/// semaphore.take(Duration::ZERO).unwrap();
/// ```
pub struct BinarySemaphore {
  lock: RawLock,
}

impl BinarySemaphore {
  /// Create a new, empty binary semaphore.
  ///
  /// Failing to create the kernel semaphore is fatal.
  #[track_caller]
  pub fn new() -> Self {
    Self { lock: RawLock::binary() }
  }
}

impl Default for BinarySemaphore {
  #[track_caller]
  fn default() -> Self {
    Self::new()
  }
}

impl Deref for BinarySemaphore {
  type Target = SemaphoreHandle;

  #[inline]
  fn deref(&self) -> &Self::Target {
    unsafe { SemaphoreHandle::from_ptr(self.lock.handle().as_ptr()) }
  }
}

impl fmt::Debug for BinarySemaphore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BinarySemaphore").field("handle", &self.lock).finish()
  }
}

/// A counting semaphore.
///
/// # Example
///
/// ```
/// use core::time::Duration;
/// use freertos_abstract::sync::CountingSemaphore;
///
/// let semaphore = CountingSemaphore::new(0, 2);
/// semaphore.give().unwrap();
/// semaphore.give().unwrap();
/// assert!(semaphore.give().is_err());
///
/// semaphore.take(Duration::MAX).unwrap();
/// assert_eq!(semaphore.count(), 1);
/// ```
pub struct CountingSemaphore {
  lock: RawLock,
}

impl CountingSemaphore {
  /// Default maximum count of [`CountingSemaphore::default`].
  pub const DEFAULT_MAX: usize = 100;

  /// Create a new counting semaphore holding `initial` out of `max`.
  ///
  /// Failing to create the kernel semaphore is fatal, which includes
  /// `initial > max`, `max == 0` and counts the kernel cannot represent.
  #[track_caller]
  pub fn new(initial: usize, max: usize) -> Self {
    let (Ok(initial), Ok(max)) = (UBaseType_t::try_from(initial), UBaseType_t::try_from(max)) else {
      fatal("counting semaphore creation failed")
    };

    Self { lock: RawLock::counting(initial, max) }
  }

  /// Get the current count.
  #[inline]
  pub fn count(&self) -> usize {
    self.lock.handle().count() as usize
  }
}

impl Default for CountingSemaphore {
  /// An empty semaphore counting up to [`CountingSemaphore::DEFAULT_MAX`].
  #[track_caller]
  fn default() -> Self {
    Self::new(0, Self::DEFAULT_MAX)
  }
}

impl Deref for CountingSemaphore {
  type Target = SemaphoreHandle;

  #[inline]
  fn deref(&self) -> &Self::Target {
    unsafe { SemaphoreHandle::from_ptr(self.lock.handle().as_ptr()) }
  }
}

impl fmt::Debug for CountingSemaphore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CountingSemaphore")
      .field("handle", &self.lock)
      .field("count", &self.count())
      .finish()
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
  fn fresh_binary_semaphore_is_empty() {
    let semaphore = BinarySemaphore::new();
    assert_eq!(semaphore.take(Duration::ZERO), Err(FreeRtosError::Timeout));
    semaphore.give().unwrap();
    assert_eq!(semaphore.give(), Err(FreeRtosError::QueueFull));
    semaphore.take(Duration::ZERO).unwrap();
  }

  #[test]
  #[cfg(target_pointer_width = "64")]
  #[should_panic(expected = "counting semaphore creation failed")]
  fn unrepresentable_max_is_fatal() {
    let _ = CountingSemaphore::new(0, UBaseType_t::MAX as usize + 2);
  }

  #[test]
  fn counting_semaphore_is_bounded() {
    const MAX: usize = 5;

    let semaphore = CountingSemaphore::new(0, MAX);
    for _ in 0..MAX {
      semaphore.give().unwrap();
    }
    assert_eq!(semaphore.give(), Err(FreeRtosError::QueueFull));
    assert_eq!(semaphore.count(), MAX);

    for _ in 0..MAX {
      semaphore.take(Duration::ZERO).unwrap();
    }
    assert_eq!(semaphore.count(), 0);
    assert!(semaphore.take(Duration::ZERO).is_err());
  }

  #[test]
  fn default_counting_semaphore() {
    let semaphore = CountingSemaphore::default();
    assert_eq!(semaphore.count(), 0);
  }

  #[test]
  fn give_wakes_a_blocked_taker() {
    let semaphore = Arc::new(BinarySemaphore::new());

    let taker = {
      let semaphore = Arc::clone(&semaphore);
      thread::spawn(move || semaphore.take(Duration::from_secs(5)))
    };

    thread::sleep(Duration::from_millis(10));
    semaphore.give().unwrap();
    assert_eq!(taker.join().unwrap(), Ok(()));
  }

  #[test]
  fn guard_gives_back() {
    let semaphore = CountingSemaphore::new(1, 1);
    {
      let _guard = semaphore.lock(Duration::ZERO).unwrap();
      assert_eq!(semaphore.count(), 0);
    }
    assert_eq!(semaphore.count(), 1);
  }

  #[test]
  fn isr_variants_never_block() {
    let semaphore = BinarySemaphore::new();
    let ic = InterruptContext::new();
    assert_eq!(semaphore.take_from_isr(&ic), Err(FreeRtosError::Unavailable));
    semaphore.give_from_isr(&ic).unwrap();
    assert!(ic.higher_priority_task_woken());
    semaphore.take_from_isr(&ic).unwrap();
  }
}
