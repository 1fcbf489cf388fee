use core::fmt;

use crate::ffi::UBaseType_t;
use crate::shim::{configMAX_PRIORITIES, tskIDLE_PRIORITY};

/// Task execution priority, relative to the idle task.
///
/// `TaskPriority::new(0)` runs at idle priority; higher numbers denote higher
/// priority tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskPriority {
  priority: u8,
}

impl TaskPriority {
  /// The idle priority.
  pub const IDLE: Self = Self { priority: 0 };

  /// Create a new `TaskPriority` `priority` levels above idle.
  ///
  /// Returns `None` if the resulting kernel priority is not below `configMAX_PRIORITIES`.
  pub const fn new(priority: u8) -> Option<Self> {
    if tskIDLE_PRIORITY + priority as UBaseType_t >= configMAX_PRIORITIES {
      return None
    }

    Some(Self { priority })
  }

  pub(crate) const fn to_freertos(self) -> UBaseType_t {
    tskIDLE_PRIORITY + self.priority as UBaseType_t
  }
}

impl Default for TaskPriority {
  /// One level above idle.
  fn default() -> Self {
    Self { priority: 1 }
  }
}

impl fmt::Display for TaskPriority {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.priority.fmt(f)
  }
}

#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct PriorityOverflow;

impl fmt::Display for PriorityOverflow {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("priority exceeds configMAX_PRIORITIES")
  }
}

impl TryFrom<u8> for TaskPriority {
  type Error = PriorityOverflow;

  fn try_from(priority: u8) -> Result<Self, Self::Error> {
    Self::new(priority).ok_or(PriorityOverflow)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn relative_to_idle() {
    let priority = TaskPriority::new(2).unwrap();
    assert_eq!(priority.to_freertos(), tskIDLE_PRIORITY + 2);
    assert_eq!(TaskPriority::IDLE.to_freertos(), tskIDLE_PRIORITY);
  }

  #[test]
  fn bounded_by_max_priorities() {
    let highest = (configMAX_PRIORITIES - tskIDLE_PRIORITY - 1) as u8;
    assert!(TaskPriority::new(highest).is_some());
    assert!(TaskPriority::try_from(highest + 1).is_err());
  }
}
