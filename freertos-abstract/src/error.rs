use core::fmt;

/// Basic error type for the library.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FreeRtosError {
  /// Timeout during a blocking operation.
  Timeout,
  /// No more space in a queue, or a semaphore is already at its maximum count.
  QueueFull,
  /// A mutex was unlocked by a task not holding it.
  NotLocked,
  /// The resource is not available without blocking.
  Unavailable,
}

impl fmt::Display for FreeRtosError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Timeout => "timed out",
      Self::QueueFull => "queue full",
      Self::NotLocked => "mutex not locked by the caller",
      Self::Unavailable => "resource unavailable",
    })
  }
}

#[cfg(not(freertos_kernel))]
impl std::error::Error for FreeRtosError {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display() {
    assert_eq!(FreeRtosError::Timeout.to_string(), "timed out");
    assert_eq!(FreeRtosError::QueueFull.to_string(), "queue full");
    assert_eq!(FreeRtosError::NotLocked.to_string(), "mutex not locked by the caller");
    assert_eq!(FreeRtosError::Unavailable.to_string(), "resource unavailable");
  }
}
