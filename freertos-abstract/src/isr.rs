use core::sync::atomic::{AtomicUsize, Ordering};

use crate::shim::{taskENTER_CRITICAL_FROM_ISR, taskEXIT_CRITICAL_FROM_ISR};

/// Interrupt mask saved by the outstanding [`Isr::enter_critical`].
static SAVED_INTERRUPT_STATUS: AtomicUsize = AtomicUsize::new(0);

/// Critical sections from interrupt context.
///
/// There is a single slot for the saved interrupt mask, shared by the whole
/// program: only one interrupt-context critical section may be outstanding at
/// any time and they do not nest.
///
/// # Examples
///
/// ```
/// use freertos_abstract::Isr;
///
/// // Inside an interrupt handler:
/// Isr::enter_critical();
/// // ...
/// Isr::exit_critical();
/// ```
#[non_exhaustive]
pub struct Isr;

impl Isr {
  /// Mask interrupts and remember the previous mask.
  #[inline]
  pub fn enter_critical() {
    let saved = unsafe { taskENTER_CRITICAL_FROM_ISR() };
    SAVED_INTERRUPT_STATUS.store(saved as usize, Ordering::Relaxed);
  }

  /// Restore the mask saved by the matching [`Isr::enter_critical`].
  #[inline]
  pub fn exit_critical() {
    let saved = SAVED_INTERRUPT_STATUS.load(Ordering::Relaxed);
    unsafe { taskEXIT_CRITICAL_FROM_ISR(saved as _) }
  }
}
