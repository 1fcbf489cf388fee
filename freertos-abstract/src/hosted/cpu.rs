use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread::{self, ThreadId};

use super::{checkpoint, current_deleted, park_forever, lock_unpoisoned, now_ticks, BaseType_t, TickType_t, UBaseType_t, pdFALSE};

pub const taskSCHEDULER_SUSPENDED: BaseType_t = 0;
pub const taskSCHEDULER_NOT_STARTED: BaseType_t = 1;
pub const taskSCHEDULER_RUNNING: BaseType_t = 2;

/// A reentrant, process-wide lock standing in for masked interrupts or a
/// suspended scheduler.
struct CpuLock {
  name: &'static str,
  owner: Mutex<Owner>,
  released: Condvar,
}

struct Owner {
  thread: Option<ThreadId>,
  depth: u32,
}

impl CpuLock {
  const fn new(name: &'static str) -> Self {
    Self {
      name,
      owner: Mutex::new(Owner { thread: None, depth: 0 }),
      released: Condvar::new(),
    }
  }

  fn acquire(&self) {
    let me = thread::current().id();
    let mut owner = lock_unpoisoned(&self.owner);
    while owner.thread.map_or(false, |thread| thread != me) {
      owner = self.released.wait(owner).unwrap_or_else(|err| err.into_inner());
    }

    owner.thread = Some(me);
    owner.depth += 1;
  }

  fn release(&self) {
    let me = thread::current().id();
    let mut owner = lock_unpoisoned(&self.owner);
    if owner.thread != Some(me) {
      log::warn!("{} released by a thread not holding it", self.name);
      return
    }

    owner.depth -= 1;
    if owner.depth == 0 {
      owner.thread = None;
      self.released.notify_all();
    }
  }

  /// Wait until no other thread holds the lock.
  fn wait_released(&self) {
    let me = thread::current().id();
    let mut owner = lock_unpoisoned(&self.owner);
    while owner.thread.map_or(false, |thread| thread != me) {
      owner = self.released.wait(owner).unwrap_or_else(|err| err.into_inner());
    }
  }

  fn is_held(&self) -> bool {
    lock_unpoisoned(&self.owner).thread.is_some()
  }
}

static CRITICAL: CpuLock = CpuLock::new("critical section");
static SCHEDULER: CpuLock = CpuLock::new("scheduler suspension");

static STARTED: AtomicBool = AtomicBool::new(false);
static ENDED: Mutex<bool> = Mutex::new(false);
static END: Condvar = Condvar::new();

/// Wait until the calling thread may run, i.e. no other thread is inside a
/// critical section or has the scheduler suspended.
pub(super) fn wait_for_cpu() {
  CRITICAL.wait_released();
  SCHEDULER.wait_released();
}

pub unsafe fn taskENTER_CRITICAL() {
  CRITICAL.acquire()
}

pub unsafe fn taskEXIT_CRITICAL() {
  CRITICAL.release()
}

pub unsafe fn taskENTER_CRITICAL_FROM_ISR() -> UBaseType_t {
  CRITICAL.acquire();
  0
}

pub unsafe fn taskEXIT_CRITICAL_FROM_ISR(_saved_interrupt_status: UBaseType_t) {
  CRITICAL.release()
}

pub unsafe fn vTaskSuspendAll() {
  checkpoint();
  SCHEDULER.acquire();

  // Deleted while waiting for the lock.
  if current_deleted() {
    SCHEDULER.release();
    park_forever()
  }
}

pub unsafe fn xTaskResumeAll() -> BaseType_t {
  SCHEDULER.release();
  pdFALSE
}

pub unsafe fn taskYIELD() {
  checkpoint();
  thread::yield_now();
}

pub unsafe fn portYIELD_FROM_ISR(woken: BaseType_t) {
  if woken != pdFALSE {
    thread::yield_now();
  }
}

pub unsafe fn xTaskGetTickCount() -> TickType_t {
  now_ticks()
}

pub unsafe fn xTaskGetSchedulerState() -> BaseType_t {
  if SCHEDULER.is_held() {
    taskSCHEDULER_SUSPENDED
  } else if STARTED.load(Ordering::Acquire) {
    taskSCHEDULER_RUNNING
  } else {
    taskSCHEDULER_NOT_STARTED
  }
}

/// Tasks already run as soon as they are created, so this only blocks the
/// calling thread until [`vTaskEndScheduler`] is called.
pub unsafe fn vTaskStartScheduler() {
  log::debug!("scheduler started");
  STARTED.store(true, Ordering::Release);

  let mut ended = lock_unpoisoned(&ENDED);
  while !*ended {
    ended = END.wait(ended).unwrap_or_else(|err| err.into_inner());
  }
  *ended = false;

  STARTED.store(false, Ordering::Release);
  log::debug!("scheduler stopped");
}

pub unsafe fn vTaskEndScheduler() {
  *lock_unpoisoned(&ENDED) = true;
  END.notify_all();
}

#[cfg(test)]
mod tests {
  use super::*;

  use std::sync::Arc;
  use std::sync::atomic::AtomicUsize;
  use std::time::Duration;

  #[test]
  fn cpu_lock_is_reentrant() {
    let lock = CpuLock::new("test");
    lock.acquire();
    lock.acquire();
    lock.release();
    assert!(lock.is_held());
    lock.release();
    assert!(!lock.is_held());
  }

  #[test]
  fn cpu_lock_excludes_other_threads() {
    let lock = Arc::new(CpuLock::new("test"));
    let entered = Arc::new(AtomicUsize::new(0));

    lock.acquire();

    let other = {
      let lock = Arc::clone(&lock);
      let entered = Arc::clone(&entered);
      thread::spawn(move || {
        lock.acquire();
        entered.store(1, Ordering::SeqCst);
        lock.release();
      })
    };

    thread::sleep(Duration::from_millis(20));
    assert_eq!(entered.load(Ordering::SeqCst), 0);

    lock.release();
    other.join().unwrap();
    assert_eq!(entered.load(Ordering::SeqCst), 1);
  }
}
