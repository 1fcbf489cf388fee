use core::{ffi::CStr, fmt, ptr, str};

use crate::ffi::{Pointee, TaskHandle_t, UBaseType_t};
use crate::shim::{
  configTASK_NOTIFICATION_ARRAY_ENTRIES,
  eTaskGetState,
  pcTaskGetName,
  vTaskNotifyGiveFromISR,
  vTaskNotifyGiveIndexedFromISR,
  vTaskResume,
  vTaskSuspend,
  xTaskNotifyGive,
  xTaskNotifyGiveIndexed,
};
use crate::InterruptContext;

use super::TaskState;

/// A handle for managing a task.
///
/// See [`Task`](crate::task::Task) for the preferred owned version.
///
/// This type is compatible with a raw FreeRTOS [`TaskHandle_t`].
#[repr(transparent)]
pub struct TaskHandle(Pointee<TaskHandle_t>);

impl fmt::Debug for TaskHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.as_ptr().fmt(f)
  }
}

pub(super) fn notification_index(index: usize) -> UBaseType_t {
  assert!(index < configTASK_NOTIFICATION_ARRAY_ENTRIES as usize, "notification index out of range");
  index as UBaseType_t
}

impl TaskHandle {
  /// Create a `TaskHandle` from a raw handle.
  ///
  /// # Safety
  ///
  /// - `ptr` must point to a valid task.
  /// - The task must not be deleted for the lifetime `'a` of the returned `TaskHandle`.
  #[inline]
  pub const unsafe fn from_ptr<'a>(ptr: TaskHandle_t) -> &'a Self {
    debug_assert!(!ptr.is_null());
    &*ptr.cast()
  }

  /// Get the raw task handle.
  #[inline]
  pub const fn as_ptr(&self) -> TaskHandle_t {
    ptr::addr_of!(self.0).cast_mut()
  }

  /// Get the name of this task.
  pub fn name(&self) -> &str {
    unsafe {
      let task_name = pcTaskGetName(self.as_ptr());
      task_name.as_ref()
        .map(|n| CStr::from_ptr(n))
        .map(|n| match n.to_str() {
          Ok(n) => n,
          Err(err) => str::from_utf8_unchecked(&n.to_bytes()[..err.valid_up_to()]),
        })
        .unwrap_or_default()
    }
  }

  /// Get the state of this task.
  #[inline]
  pub fn state(&self) -> TaskState {
    TaskState::from_freertos(unsafe { eTaskGetState(self.as_ptr()) })
  }

  /// Suspend execution of the task.
  #[inline]
  pub fn suspend(&self) {
    unsafe { vTaskSuspend(self.as_ptr()) }
  }

  /// Resume execution of the task.
  #[inline]
  pub fn resume(&self) {
    unsafe { vTaskResume(self.as_ptr()) }
  }

  /// Increment the notification value at `index`, or the default one.
  ///
  /// # Panics
  ///
  /// This panics if `index` is not within \[0, `configTASK_NOTIFICATION_ARRAY_ENTRIES`\).
  pub fn notify_give(&self, index: Option<usize>) {
    let _ = match index {
      Some(index) => unsafe { xTaskNotifyGiveIndexed(self.as_ptr(), notification_index(index)) },
      None => unsafe { xTaskNotifyGive(self.as_ptr()) },
    };
  }

  /// Increment the notification value at `index`, or the default one, from
  /// within an interrupt service routine.
  ///
  /// # Panics
  ///
  /// This panics if `index` is not within \[0, `configTASK_NOTIFICATION_ARRAY_ENTRIES`\).
  pub fn notify_give_from_isr(&self, index: Option<usize>, ic: &InterruptContext) {
    match index {
      Some(index) => unsafe {
        vTaskNotifyGiveIndexedFromISR(self.as_ptr(), notification_index(index), ic.as_ptr())
      },
      None => unsafe { vTaskNotifyGiveFromISR(self.as_ptr(), ic.as_ptr()) },
    }
  }
}
