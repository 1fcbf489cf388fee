//! Hosted kernel.
//!
//! Implements the subset of the FreeRTOS API this crate uses on top of `std`
//! threads, so everything can run and be tested on a development machine:
//!
//! - Tasks are threads. A thread which calls into the kernel without having
//!   been created by [`xTaskCreate`] is adopted as a task on first use.
//! - Semaphores are a counter guarded by a mutex and a condition variable.
//! - Software timers are serviced by a daemon thread fed through a channel.
//! - Critical sections and scheduler suspension are process-wide reentrant
//!   locks. Other tasks stop at their next kernel call until they are released.
//! - One tick is one millisecond, counted from the first kernel call.
//!
//! There is no preemption: suspending or deleting another task takes effect
//! the next time that task enters the kernel.
#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]
#![allow(non_snake_case)]
#![allow(clippy::missing_safety_doc)]

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::ffi::{c_char, c_void};
use std::sync::{Condvar, MutexGuard, OnceLock};
use std::time::{Duration, Instant};

mod cpu;
pub use cpu::*;
mod semaphore;
pub use semaphore::*;
mod task;
pub use task::*;
mod timer;
pub use timer::*;

pub type BaseType_t = i32;
pub type UBaseType_t = u32;
pub type TickType_t = u32;
pub type StackType_t = usize;

pub type TaskFunction_t = Option<unsafe extern "C" fn(*mut c_void)>;
pub type TimerCallbackFunction_t = Option<unsafe extern "C" fn(TimerHandle_t)>;
pub type PendedFunction_t = Option<unsafe extern "C" fn(*mut c_void, u32)>;

pub const pdFALSE: BaseType_t = 0;
pub const pdTRUE: BaseType_t = 1;
pub const pdFAIL: BaseType_t = pdFALSE;
pub const pdPASS: BaseType_t = pdTRUE;
pub const errQUEUE_FULL: BaseType_t = 0;
pub const errQUEUE_EMPTY: BaseType_t = 0;
pub const errCOULD_NOT_ALLOCATE_REQUIRED_MEMORY: BaseType_t = -1;

pub const portMAX_DELAY: TickType_t = TickType_t::MAX;

pub const configTICK_RATE_HZ: TickType_t = 1000;
pub const configMINIMAL_STACK_SIZE: u16 = 256;
pub const configTIMER_TASK_STACK_DEPTH: u16 = 256;
pub const configMAX_PRIORITIES: UBaseType_t = 16;
pub const configMAX_TASK_NAME_LEN: usize = 16;
pub const configTASK_NOTIFICATION_ARRAY_ENTRIES: UBaseType_t = 3;

pub const tskIDLE_PRIORITY: UBaseType_t = 0;

/// Granularity at which blocked tasks look for suspension and deletion.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

thread_local! {
  static FAIL_NEXT_ALLOCATION: Cell<bool> = Cell::new(false);
}

/// Make the next kernel object creation on the calling thread fail as if the
/// kernel heap were exhausted.
pub fn fail_next_allocation() {
  FAIL_NEXT_ALLOCATION.with(|fail| fail.set(true));
}

fn allocation_fails() -> bool {
  FAIL_NEXT_ALLOCATION.with(|fail| fail.replace(false))
}

fn origin() -> Instant {
  static ORIGIN: OnceLock<Instant> = OnceLock::new();
  *ORIGIN.get_or_init(Instant::now)
}

fn ticks_to_duration(ticks: TickType_t) -> Duration {
  Duration::from_millis(u64::from(ticks) * 1000 / u64::from(configTICK_RATE_HZ))
}

fn now_ticks() -> TickType_t {
  let elapsed = origin().elapsed().as_millis() * u128::from(configTICK_RATE_HZ) / 1000;
  elapsed as TickType_t
}

/// Instant at which `ticks` from now elapse, `None` for `portMAX_DELAY`.
fn deadline(ticks: TickType_t) -> Option<Instant> {
  if ticks == portMAX_DELAY {
    None
  } else {
    Some(Instant::now() + ticks_to_duration(ticks))
  }
}

/// Block the calling task on `cond` until `ready` returns `true` or the wait
/// budget expires.
///
/// `ready` is evaluated with the lock held. The task is reported as blocked
/// while waiting and passes through [`checkpoint`] between polls, so it can be
/// suspended or deleted while waiting.
fn block_on<S>(
  lock: &std::sync::Mutex<S>,
  cond: &Condvar,
  ticks: TickType_t,
  mut ready: impl FnMut(&mut S) -> bool,
) -> bool {
  let deadline = deadline(ticks);
  let _blocked = BlockedGuard::new();

  loop {
    let mut state = lock_unpoisoned(lock);
    if ready(&mut state) {
      return true
    }

    let timeout = match deadline {
      Some(deadline) => {
        let now = Instant::now();
        if now >= deadline {
          return false
        }
        (deadline - now).min(POLL_INTERVAL)
      },
      None => POLL_INTERVAL,
    };

    let (state, _) = cond.wait_timeout(state, timeout).unwrap_or_else(|err| err.into_inner());
    drop(state);

    checkpoint();
  }
}

fn lock_unpoisoned<S>(lock: &std::sync::Mutex<S>) -> MutexGuard<'_, S> {
  lock.lock().unwrap_or_else(|err| err.into_inner())
}

/// Alignment of `pvPortMalloc` (`portBYTE_ALIGNMENT`), also the size of the
/// header holding the requested size.
const HEADER: usize = 8;

/// Kernel heap on top of the system allocator, so it keeps working when
/// [`crate::Allocator`] is the global allocator.
pub unsafe fn pvPortMalloc(size: usize) -> *mut c_void {
  let Some(layout) = size.checked_add(HEADER).and_then(|total| Layout::from_size_align(total, HEADER).ok()) else {
    return std::ptr::null_mut()
  };

  let ptr = System.alloc(layout);
  if ptr.is_null() {
    return ptr.cast()
  }

  ptr.cast::<usize>().write(size);
  ptr.add(HEADER).cast()
}

pub unsafe fn vPortFree(ptr: *mut c_void) {
  if ptr.is_null() {
    return
  }

  let ptr = ptr.cast::<u8>().sub(HEADER);
  let size = ptr.cast::<usize>().read();
  System.dealloc(ptr, Layout::from_size_align_unchecked(size + HEADER, HEADER));
}

/// Copy a C string into an owned name, truncated to `configMAX_TASK_NAME_LEN`.
unsafe fn copy_name(name: *const c_char) -> Option<std::ffi::CString> {
  if name.is_null() {
    return None
  }

  let bytes = std::ffi::CStr::from_ptr(name).to_bytes();
  let len = bytes.len().min(configMAX_TASK_NAME_LEN - 1);
  std::ffi::CString::new(&bytes[..len]).ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn malloc_roundtrip() {
    unsafe {
      let ptr = pvPortMalloc(24).cast::<u8>();
      assert!(!ptr.is_null());
      ptr.write_bytes(0xa5, 24);
      assert_eq!(*ptr.add(23), 0xa5);
      vPortFree(ptr.cast());
    }
  }

  #[test]
  fn tick_conversion() {
    assert_eq!(ticks_to_duration(250), Duration::from_millis(250));
    assert!(deadline(portMAX_DELAY).is_none());
  }

  #[test]
  fn name_is_truncated() {
    let name = unsafe { copy_name(b"a-very-long-task-name\0".as_ptr().cast()) }.unwrap();
    assert_eq!(name.as_bytes().len(), configMAX_TASK_NAME_LEN - 1);
  }
}
