use core::marker::PhantomData;

use crate::ffi::BaseType_t;
use crate::shim::{
  pdTRUE,
  taskENTER_CRITICAL,
  taskEXIT_CRITICAL,
  taskSCHEDULER_NOT_STARTED,
  taskSCHEDULER_RUNNING,
  taskSCHEDULER_SUSPENDED,
  taskYIELD,
  vTaskEndScheduler,
  vTaskStartScheduler,
  vTaskSuspendAll,
  xTaskGetSchedulerState,
  xTaskGetTickCount,
  xTaskResumeAll,
};
use crate::ticks::Ticks;

/// State of the task scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
  /// Execution of all tasks is suspended.
  Suspended,
  /// Scheduler was not yet started.
  NotStarted,
  /// Scheduler is running.
  Running,
}

impl SchedulerState {
  pub(crate) fn from_freertos(state: BaseType_t) -> Self {
    match state {
      taskSCHEDULER_SUSPENDED => SchedulerState::Suspended,
      taskSCHEDULER_NOT_STARTED => SchedulerState::NotStarted,
      taskSCHEDULER_RUNNING => SchedulerState::Running,
      _ => unreachable!(),
    }
  }
}

/// Scheduler-wide controls.
///
/// None of these affect a single task. Critical sections and scheduler
/// suspension must be balanced by the caller, and nothing inside either may
/// block.
#[non_exhaustive]
pub struct Scheduler;

impl Scheduler {
  /// Start scheduling tasks.
  ///
  /// This only returns once [`Scheduler::stop`] is called, or if the kernel
  /// could not create the idle or timer tasks.
  pub fn start() {
    log::trace!("starting the scheduler");
    unsafe { vTaskStartScheduler() }
  }

  /// Stop the scheduler, returning from [`Scheduler::start`] where the port supports it.
  pub fn stop() {
    unsafe { vTaskEndScheduler() }
  }

  /// Get the current scheduler state.
  #[inline]
  pub fn state() -> SchedulerState {
    SchedulerState::from_freertos(unsafe { xTaskGetSchedulerState() })
  }

  /// Number of ticks since the scheduler was started.
  #[inline]
  pub fn tick_count() -> Ticks {
    unsafe { xTaskGetTickCount() }.into()
  }

  /// Suspend the scheduler without disabling interrupts.
  #[inline]
  pub fn suspend_all() {
    unsafe { vTaskSuspendAll() }
  }

  /// Resume the scheduler.
  ///
  /// Returns `true` if resuming the scheduler caused a context switch.
  #[inline]
  pub fn resume_all() -> bool {
    unsafe { xTaskResumeAll() == pdTRUE }
  }

  /// Request a context switch to another task of equal or higher priority.
  #[inline]
  pub fn yield_now() {
    unsafe { taskYIELD() }
  }

  /// Enter a critical section.
  #[inline]
  pub fn enter_critical() {
    unsafe { taskENTER_CRITICAL() }
  }

  /// Exit a critical section.
  #[inline]
  pub fn exit_critical() {
    unsafe { taskEXIT_CRITICAL() }
  }

  /// Enter a critical section which is exited when the returned guard is dropped.
  #[inline]
  pub fn critical() -> CriticalSectionGuard {
    Self::enter_critical();
    CriticalSectionGuard { _not_send: PhantomData }
  }

  /// Suspend the scheduler until the returned guard is dropped.
  #[inline]
  pub fn suspended() -> SuspendedGuard {
    Self::suspend_all();
    SuspendedGuard { _not_send: PhantomData }
  }
}

/// An RAII critical section, see [`Scheduler::critical`].
#[must_use = "if unused the critical section is exited immediately"]
#[derive(Debug)]
pub struct CriticalSectionGuard {
  _not_send: PhantomData<*mut ()>,
}

impl Drop for CriticalSectionGuard {
  fn drop(&mut self) {
    Scheduler::exit_critical()
  }
}

/// An RAII scheduler suspension, see [`Scheduler::suspended`].
#[must_use = "if unused the scheduler resumes immediately"]
#[derive(Debug)]
pub struct SuspendedGuard {
  _not_send: PhantomData<*mut ()>,
}

impl Drop for SuspendedGuard {
  fn drop(&mut self) {
    Scheduler::resume_all();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn suspended_guard_reports_state() {
    let _suspended = Scheduler::suspended();
    assert_eq!(Scheduler::state(), SchedulerState::Suspended);
  }

  #[test]
  fn critical_sections_nest() {
    let _outer = Scheduler::critical();
    let _inner = Scheduler::critical();
  }

  #[test]
  fn tick_count_advances() {
    let before = Scheduler::tick_count();
    std::thread::sleep(core::time::Duration::from_millis(5));
    assert!(Scheduler::tick_count() > before);
  }
}
