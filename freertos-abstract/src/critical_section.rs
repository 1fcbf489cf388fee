use critical_section::RawRestoreState;

use crate::shim::{taskENTER_CRITICAL, taskEXIT_CRITICAL};

/// Critical section implementation based on the kernel's task-level critical section.
///
/// For more information, visit the [`critical_section`] documentation.
#[non_exhaustive]
pub struct KernelCriticalSection {}

critical_section::set_impl!(KernelCriticalSection);

unsafe impl critical_section::Impl for KernelCriticalSection {
  #[inline(always)]
  unsafe fn acquire() -> RawRestoreState {
    taskENTER_CRITICAL()
  }

  #[inline(always)]
  unsafe fn release(_token: RawRestoreState) {
    taskEXIT_CRITICAL()
  }
}
