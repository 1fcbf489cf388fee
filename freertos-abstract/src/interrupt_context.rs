use core::cell::UnsafeCell;
use core::marker::PhantomData;

use crate::shim::{portYIELD_FROM_ISR, pdFALSE};
use crate::ffi::BaseType_t;

/// Representation of an interrupt context.
///
/// The existence of this struct means that the current function is inside an interrupt service
/// routine. The kernel needs to keep track of whether or not to yield the execution to a different
/// task after returning from the interrupt routine, so this struct needs to be passed to all
/// `*_from_isr` functions.
///
/// A single `InterruptContext` should be created at the start of an interrupt routine and dropped
/// as the last thing inside the same interrupt routine as dropping it calls `portYIELD_FROM_ISR`.
#[repr(transparent)]
#[must_use]
pub struct InterruptContext {
  x_higher_priority_task_woken: UnsafeCell<BaseType_t>,
  // Only valid in the interrupt it was created in.
  _not_send: PhantomData<*mut ()>,
}

impl InterruptContext {
  /// Instantiate a new interrupt context.
  ///
  /// This must be called from within an interrupt service routine.
  #[allow(clippy::new_without_default)]
  pub fn new() -> Self {
    Self { x_higher_priority_task_woken: UnsafeCell::new(pdFALSE), _not_send: PhantomData }
  }

  /// Get the pointer to the contained `BaseType_t` for passing it to a kernel API function.
  pub fn as_ptr(&self) -> *mut BaseType_t {
    self.x_higher_priority_task_woken.get()
  }

  /// Whether a task of higher priority than the interrupted one was woken.
  pub fn higher_priority_task_woken(&self) -> bool {
    unsafe { *self.x_higher_priority_task_woken.get() != pdFALSE }
  }
}

impl Drop for InterruptContext {
  fn drop(&mut self) {
    unsafe { portYIELD_FROM_ISR(*self.x_higher_priority_task_woken.get_mut()) }
  }
}
