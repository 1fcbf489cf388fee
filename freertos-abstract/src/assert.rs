//! Assertion handling for unrecoverable kernel failures.
//!
//! Failing to create a kernel object (semaphore, task or timer) is not
//! something callers are expected to handle. Instead the assertion handler
//! is called, which by default panics. If a custom handler returns, execution
//! halts.

use core::{
  mem,
  sync::atomic::{AtomicPtr, Ordering},
};

type AssertFunction = fn(&str, &str, u32);

static ASSERT_FUNCTION: AtomicPtr<()> = AtomicPtr::new(assert_panic as *mut ());

/// Set a custom assertion handler.
///
/// # Examples
///
/// ```
/// fn my_assertion_handler(message: &str, file_name: &str, line: u32) {
///   panic!("FreeRTOS assertion in file {} at line {} failed: {}", file_name, line, message);
/// }
///
/// freertos_abstract::assert::set_handler(my_assertion_handler);
/// ```
pub fn set_handler(f: fn(&str, &str, u32)) {
  ASSERT_FUNCTION.store(f as *mut (), Ordering::Release);
}

fn assert_panic(message: &str, file_name: &str, line: u32) {
  let file_name = file_name.rsplit_once('/').map(|(_, s)| s).unwrap_or(file_name);
  panic!("assertion at {}:{} failed: {}", file_name, line, message);
}

fn handler() -> AssertFunction {
  // SAFETY: Only ever stores `AssertFunction`s.
  unsafe { mem::transmute::<*mut (), AssertFunction>(ASSERT_FUNCTION.load(Ordering::Acquire)) }
}

/// Report an unrecoverable failure and never return.
#[track_caller]
pub fn fatal(message: &str) -> ! {
  let location = core::panic::Location::caller();
  log::error!("{} ({}:{})", message, location.file(), location.line());

  handler()(message, location.file(), location.line());

  loop {
    core::hint::spin_loop();
  }
}

/// Target for `configASSERT` in `FreeRTOSConfig.h`:
///
/// ```c
/// extern void vAssertCalled(const char *file, size_t file_len, unsigned long line);
/// #define configASSERT(x) if ((x) == 0) vAssertCalled(__FILE__, sizeof(__FILE__) - 1, __LINE__)
/// ```
#[cfg(freertos_kernel)]
#[no_mangle]
extern "C" fn vAssertCalled(file_name: *const core::ffi::c_char, file_name_len: usize, line: core::ffi::c_ulong) {
  let file_name = unsafe { core::slice::from_raw_parts(file_name.cast::<u8>(), file_name_len) };
  let file_name = core::str::from_utf8(file_name).unwrap_or("<kernel>");

  log::error!("kernel assertion failed ({}:{})", file_name, line);
  handler()("kernel assertion failed", file_name, line as u32);

  loop {
    core::hint::spin_loop();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  #[should_panic(expected = "assertion at assert.rs")]
  fn default_handler_panics() {
    fatal("semaphore creation failed");
  }
}
