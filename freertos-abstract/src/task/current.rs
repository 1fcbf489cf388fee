use core::marker::PhantomData;
use core::sync::atomic::AtomicBool;

use crate::shim::{vTaskDelay, xTaskGetCurrentTaskHandle};
use crate::ticks::Ticks;

use super::{terminate, TaskHandle};

/// The task that is currently executing, passed to the function of a new task.
pub struct CurrentTask {
  exited: *const AtomicBool,
  _not_send: PhantomData<*mut ()>,
}

impl CurrentTask {
  pub(super) fn new(exited: *const AtomicBool) -> Self {
    Self { exited, _not_send: PhantomData }
  }

  /// Get the handle of the current task.
  #[inline]
  pub fn handle(&self) -> &TaskHandle {
    unsafe { TaskHandle::from_ptr(xTaskGetCurrentTaskHandle()) }
  }

  /// Delay the execution of the current task.
  #[inline]
  pub fn delay(&self, delay: impl Into<Ticks>) {
    unsafe { vTaskDelay(delay.into().into()) }
  }

  /// Terminate the current task right away.
  ///
  /// Values owned by the task function are not dropped.
  pub fn delete_self(&self) -> ! {
    log::trace!("task {:p} deletes itself", self.handle().as_ptr());
    unsafe { terminate(self.exited) }
  }
}
