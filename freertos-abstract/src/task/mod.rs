//! Task primitives.
//!
//! # Examples
//!
//! ```
//! use core::time::Duration;
//! use freertos_abstract::task::{Task, TaskPriority};
//!
//! let task = Task::new()
//!   .name("worker")
//!   .priority(TaskPriority::new(2).unwrap())
//!   .start(|current| {
//!     Task::notify_take(Duration::MAX, true, None);
//!     current.delay(Duration::from_millis(1));
//!   });
//!
//! task.notify_give(None);
//! ```

use core::fmt;
use core::mem;
use core::sync::atomic::{AtomicBool, Ordering};

use alloc2::boxed::Box;

use crate::{
  ffi::TaskHandle_t,
  shim::{
    configMINIMAL_STACK_SIZE,
    pdFALSE,
    pdTRUE,
    ulTaskNotifyTake,
    ulTaskNotifyTakeIndexed,
    vTaskDelete,
    vTaskSuspendAll,
    xTaskGetCurrentTaskHandle,
    xTaskResumeAll,
  },
  InterruptContext,
  Ticks,
};

mod async_job;
pub use async_job::AsyncJob;
mod builder;
pub use builder::TaskBuilder;
mod current;
pub use current::CurrentTask;
mod handle;
pub use handle::TaskHandle;
use handle::notification_index;
mod name;
use name::TaskName;
mod priority;
pub use priority::{PriorityOverflow, TaskPriority};
mod scheduler;
pub use scheduler::{CriticalSectionGuard, Scheduler, SchedulerState, SuspendedGuard};
mod state;
pub use state::TaskState;

/// Default task stack size in words.
pub const DEFAULT_STACK_SIZE: u16 = configMINIMAL_STACK_SIZE;

/// An owned task.
///
/// Dropping a `Task` deletes the task unless its function has already
/// returned.
pub struct Task {
  handle: TaskHandle_t,
  name: TaskName,
  /// Set by the task itself once it no longer runs its function.
  exited: Box<AtomicBool>,
  deleted: bool,
  #[cfg(feature = "static_allocation")]
  _storage: TaskStorage,
}

unsafe impl Send for Task {}
unsafe impl Sync for Task {}

impl Task {
  /// Prepare a builder object for the new task.
  pub fn new() -> TaskBuilder<'static> {
    TaskBuilder::new()
  }

  /// Get the name of this task.
  pub fn name(&self) -> &str {
    self.name.as_str()
  }

  /// Get the state of this task.
  pub fn state(&self) -> TaskState {
    self.with_handle(TaskHandle::state).unwrap_or(TaskState::Deleted)
  }

  /// Suspend execution of the task.
  pub fn suspend(&self) {
    self.with_handle(TaskHandle::suspend);
  }

  /// Resume execution of the task.
  pub fn resume(&self) {
    self.with_handle(TaskHandle::resume);
  }

  /// Increment the notification value at `index`, or the default one.
  ///
  /// Does nothing if the task no longer exists.
  ///
  /// # Panics
  ///
  /// This panics if `index` is not within \[0, `configTASK_NOTIFICATION_ARRAY_ENTRIES`\).
  pub fn notify_give(&self, index: Option<usize>) {
    if self.with_handle(|handle| handle.notify_give(index)).is_none() {
      log::warn!("notification for terminated task {:?} dropped", self.name());
    }
  }

  /// Increment the notification value at `index`, or the default one, from
  /// within an interrupt service routine.
  ///
  /// # Panics
  ///
  /// This panics if `index` is not within \[0, `configTASK_NOTIFICATION_ARRAY_ENTRIES`\).
  pub fn notify_give_from_isr(&self, index: Option<usize>, ic: &InterruptContext) {
    // The task cannot make progress while the interrupt runs.
    if !self.deleted && !self.exited.load(Ordering::Acquire) {
      unsafe { TaskHandle::from_ptr(self.handle) }.notify_give_from_isr(index, ic)
    }
  }

  /// Wait for a notification of the calling task at `index`, or the default one.
  ///
  /// Returns the notification value before it was decremented, or cleared
  /// if `reset` is set. Returns 0 if no notification arrived within `timeout`.
  ///
  /// # Panics
  ///
  /// This panics if `index` is not within \[0, `configTASK_NOTIFICATION_ARRAY_ENTRIES`\).
  pub fn notify_take(timeout: impl Into<Ticks>, reset: bool, index: Option<usize>) -> u32 {
    let clear_on_exit = if reset { pdTRUE } else { pdFALSE };
    let ticks = timeout.into().into();

    match index {
      Some(index) => unsafe { ulTaskNotifyTakeIndexed(notification_index(index), clear_on_exit, ticks) },
      None => unsafe { ulTaskNotifyTake(clear_on_exit, ticks) },
    }
  }

  /// Delete the task. Deleting it again does nothing.
  ///
  /// Values owned by the task function are not dropped if it is still running.
  pub fn delete(&mut self) {
    if mem::replace(&mut self.deleted, true) {
      return
    }

    if unsafe { xTaskGetCurrentTaskHandle() } == self.handle {
      log::trace!("task {:?} deleted by its own handle", self.name());
      unsafe { vTaskDelete(core::ptr::null_mut()) }
      return
    }

    let _suspended = Scheduler::suspended();

    // A terminated task is suspended in static builds, otherwise it is gone already.
    if cfg!(feature = "static_allocation") || !self.exited.load(Ordering::Acquire) {
      log::trace!("deleting task {:?} ({:p})", self.name(), self.handle);
      unsafe { vTaskDelete(self.handle) }
    }
  }

  /// Run `f` with the handle if the task still exists.
  fn with_handle<R>(&self, f: impl FnOnce(&TaskHandle) -> R) -> Option<R> {
    if self.deleted {
      return None
    }

    // Nothing can terminate the calling task while it runs.
    if unsafe { xTaskGetCurrentTaskHandle() } == self.handle {
      return Some(f(unsafe { TaskHandle::from_ptr(self.handle) }))
    }

    let _suspended = Scheduler::suspended();
    if self.exited.load(Ordering::Acquire) {
      return None
    }

    Some(f(unsafe { TaskHandle::from_ptr(self.handle) }))
  }
}

impl fmt::Debug for Task {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Task")
      .field("handle", &self.handle)
      .field("name", &self.name())
      .finish()
  }
}

impl Drop for Task {
  fn drop(&mut self) {
    self.delete()
  }
}

/// Stack and control block of a task in static builds.
#[cfg(feature = "static_allocation")]
struct TaskStorage {
  tcb: crate::alloc::Storage<crate::shim::StaticTask_t>,
  stack: Box<[core::cell::UnsafeCell<core::mem::MaybeUninit<crate::shim::StackType_t>>]>,
}

#[cfg(feature = "static_allocation")]
impl TaskStorage {
  fn new(stack_size: u16) -> Self {
    use core::{cell::UnsafeCell, iter, mem::MaybeUninit};

    Self {
      tcb: crate::alloc::Storage::new(),
      stack: iter::repeat_with(|| UnsafeCell::new(MaybeUninit::uninit()))
        .take(stack_size.into())
        .collect(),
    }
  }

  fn tcb_ptr(&self) -> *mut crate::shim::StaticTask_t {
    self.tcb.as_mut_ptr()
  }

  fn stack_ptr(&self) -> *mut crate::shim::StackType_t {
    self.stack.as_ptr().cast_mut().cast()
  }
}

/// Mark the calling task as terminated and remove it from scheduling.
///
/// # Safety
///
/// `exited` must be the flag of the calling task.
unsafe fn terminate(exited: *const AtomicBool) -> ! {
  vTaskSuspendAll();
  (*exited).store(true, Ordering::Release);
  xTaskResumeAll();

  remove_self()
}

#[cfg(not(feature = "static_allocation"))]
unsafe fn remove_self() -> ! {
  vTaskDelete(core::ptr::null_mut());
  unreachable!()
}

/// The owner deletes the task before releasing its stack and control block.
#[cfg(feature = "static_allocation")]
unsafe fn remove_self() -> ! {
  loop {
    crate::shim::vTaskSuspend(core::ptr::null_mut());
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use std::sync::atomic::AtomicU32;
  use std::sync::Arc;
  use std::time::Duration;

  use crate::sync::BinarySemaphore;

  fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..500 {
      if condition() {
        return
      }
      std::thread::sleep(Duration::from_millis(2));
    }
    panic!("condition not reached");
  }

  #[test]
  fn finished_task_reports_deleted() {
    let task = Task::new().name("short").start(|_| {});
    wait_for(|| task.state() == TaskState::Deleted);
  }

  #[test]
  fn task_name_is_kept() {
    let task = Task::new().name("named").start(|_| {});
    assert_eq!(task.name(), "named");
  }

  #[test]
  fn notifications_reach_the_task() {
    let received = Arc::new(AtomicU32::new(0));
    let ready = Arc::new(BinarySemaphore::new());

    let task = {
      let received = Arc::clone(&received);
      let ready = Arc::clone(&ready);
      Task::new().name("notified").start(move |_| {
        ready.give().unwrap();
        let value = Task::notify_take(Duration::from_secs(5), true, Some(1));
        received.store(value, Ordering::SeqCst);
      })
    };

    ready.take(Duration::MAX).unwrap();
    task.notify_give(Some(1));
    task.notify_give(Some(1));

    wait_for(|| task.state() == TaskState::Deleted);
    assert!(received.load(Ordering::SeqCst) >= 1);
  }

  #[test]
  fn isr_notifications_reach_the_task() {
    let received = Arc::new(AtomicU32::new(0));
    let ready = Arc::new(BinarySemaphore::new());

    let task = {
      let received = Arc::clone(&received);
      let ready = Arc::clone(&ready);
      Task::new().name("isr-notified").start(move |_| {
        ready.give().unwrap();
        let value = Task::notify_take(Duration::from_secs(5), true, None);
        received.store(value, Ordering::SeqCst);
      })
    };

    ready.take(Duration::MAX).unwrap();
    {
      let ic = InterruptContext::new();
      task.notify_give_from_isr(None, &ic);
      task.notify_give_from_isr(None, &ic);
    }

    wait_for(|| task.state() == TaskState::Deleted);
    assert!(received.load(Ordering::SeqCst) >= 1);

    // The task is gone, so this must not reach the kernel.
    let ic = InterruptContext::new();
    task.notify_give_from_isr(None, &ic);
  }

  #[test]
  fn notify_take_times_out() {
    assert_eq!(Task::notify_take(Duration::from_millis(5), true, None), 0);
  }

  #[test]
  fn suspend_and_resume() {
    let ticks = Arc::new(AtomicU32::new(0));

    let task = {
      let ticks = Arc::clone(&ticks);
      Task::new().name("ticker").start(move |current| loop {
        ticks.fetch_add(1, Ordering::SeqCst);
        current.delay(Duration::from_millis(1));
      })
    };

    wait_for(|| ticks.load(Ordering::SeqCst) > 2);
    task.suspend();
    wait_for(|| task.state() == TaskState::Suspended);
    // Let it reach its next kernel call.
    std::thread::sleep(Duration::from_millis(10));

    let frozen = ticks.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(ticks.load(Ordering::SeqCst), frozen);

    task.resume();
    wait_for(|| ticks.load(Ordering::SeqCst) > frozen);
  }

  #[test]
  fn delete_is_idempotent() {
    let mut task = Task::new().name("looping").start(|current| loop {
      current.delay(Duration::from_millis(1));
    });

    task.delete();
    assert_eq!(task.state(), TaskState::Deleted);
    task.delete();
    assert_eq!(task.state(), TaskState::Deleted);
  }

  #[test]
  fn delete_self_terminates() {
    let after = Arc::new(AtomicU32::new(0));

    let task = {
      let after = Arc::clone(&after);
      Task::new().name("quitter").start(move |current| {
        if after.load(Ordering::SeqCst) == 0 {
          current.delete_self();
        }
        after.store(1, Ordering::SeqCst);
      })
    };

    wait_for(|| task.state() == TaskState::Deleted);
    assert_eq!(after.load(Ordering::SeqCst), 0);
  }
}
