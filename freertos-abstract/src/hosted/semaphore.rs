use std::sync::{Condvar, Mutex};

use super::{
  allocation_fails, block_on, checkpoint, current_task, lock_unpoisoned,
  BaseType_t, TickType_t, UBaseType_t, errQUEUE_FULL, pdFALSE, pdTRUE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
  Mutex,
  Binary,
  Counting,
}

/// Semaphore control block of the hosted kernel.
pub struct QueueDefinition {
  kind: Kind,
  state: Mutex<Count>,
  available: Condvar,
}

pub type QueueHandle_t = *mut QueueDefinition;
pub type SemaphoreHandle_t = QueueHandle_t;

/// Storage handed to the `*Static` creation functions; unused by the hosted kernel.
#[repr(C)]
pub struct StaticSemaphore_t {
  _opaque: [usize; 8],
}

struct Count {
  value: UBaseType_t,
  max: UBaseType_t,
  /// Task holding a mutex, as an address.
  holder: Option<usize>,
}

impl Count {
  fn take(&mut self, kind: Kind, taker: Option<usize>) -> bool {
    if self.value == 0 {
      return false
    }

    self.value -= 1;
    if kind == Kind::Mutex {
      self.holder = taker;
    }
    true
  }

  fn give(&mut self, kind: Kind, giver: Option<usize>) -> bool {
    if self.value >= self.max {
      return false
    }

    if kind == Kind::Mutex {
      if giver.is_some() && self.holder.is_some() && self.holder != giver {
        return false
      }
      self.holder = None;
    }

    self.value += 1;
    true
  }
}

fn create(kind: Kind, max: UBaseType_t, initial: UBaseType_t) -> SemaphoreHandle_t {
  if allocation_fails() || max == 0 || initial > max {
    return std::ptr::null_mut()
  }

  let semaphore = Box::new(QueueDefinition {
    kind,
    state: Mutex::new(Count { value: initial, max, holder: None }),
    available: Condvar::new(),
  });

  Box::into_raw(semaphore)
}

fn current_task_address() -> usize {
  std::sync::Arc::as_ptr(&current_task()) as usize
}

pub unsafe fn xSemaphoreCreateMutex() -> SemaphoreHandle_t {
  create(Kind::Mutex, 1, 1)
}

pub unsafe fn xSemaphoreCreateBinary() -> SemaphoreHandle_t {
  create(Kind::Binary, 1, 0)
}

pub unsafe fn xSemaphoreCreateCounting(max: UBaseType_t, initial: UBaseType_t) -> SemaphoreHandle_t {
  create(Kind::Counting, max, initial)
}

pub unsafe fn xSemaphoreCreateMutexStatic(buffer: *mut StaticSemaphore_t) -> SemaphoreHandle_t {
  if buffer.is_null() {
    return std::ptr::null_mut()
  }
  xSemaphoreCreateMutex()
}

pub unsafe fn xSemaphoreCreateBinaryStatic(buffer: *mut StaticSemaphore_t) -> SemaphoreHandle_t {
  if buffer.is_null() {
    return std::ptr::null_mut()
  }
  xSemaphoreCreateBinary()
}

pub unsafe fn xSemaphoreCreateCountingStatic(
  max: UBaseType_t,
  initial: UBaseType_t,
  buffer: *mut StaticSemaphore_t,
) -> SemaphoreHandle_t {
  if buffer.is_null() {
    return std::ptr::null_mut()
  }
  xSemaphoreCreateCounting(max, initial)
}

pub unsafe fn vSemaphoreDelete(semaphore: SemaphoreHandle_t) {
  drop(Box::from_raw(semaphore));
}

pub unsafe fn xSemaphoreTake(semaphore: SemaphoreHandle_t, ticks: TickType_t) -> BaseType_t {
  checkpoint();

  let semaphore = &*semaphore;
  let taker = Some(current_task_address());

  if block_on(&semaphore.state, &semaphore.available, ticks, |count| count.take(semaphore.kind, taker)) {
    pdTRUE
  } else {
    pdFALSE
  }
}

pub unsafe fn xSemaphoreGive(semaphore: SemaphoreHandle_t) -> BaseType_t {
  checkpoint();

  let semaphore = &*semaphore;
  let giver = Some(current_task_address());

  let mut count = lock_unpoisoned(&semaphore.state);
  if !count.give(semaphore.kind, giver) {
    return errQUEUE_FULL
  }

  // Notify before unlocking: a woken taker may free the semaphore right away.
  semaphore.available.notify_one();
  drop(count);

  pdTRUE
}

pub unsafe fn xSemaphoreTakeFromISR(semaphore: SemaphoreHandle_t, _woken: *mut BaseType_t) -> BaseType_t {
  let semaphore = &*semaphore;

  if lock_unpoisoned(&semaphore.state).take(semaphore.kind, None) {
    pdTRUE
  } else {
    pdFALSE
  }
}

pub unsafe fn xSemaphoreGiveFromISR(semaphore: SemaphoreHandle_t, woken: *mut BaseType_t) -> BaseType_t {
  let semaphore = &*semaphore;

  let mut count = lock_unpoisoned(&semaphore.state);
  if !count.give(semaphore.kind, None) {
    return errQUEUE_FULL
  }

  semaphore.available.notify_one();
  drop(count);

  if !woken.is_null() {
    *woken = pdTRUE;
  }

  pdTRUE
}

pub unsafe fn uxSemaphoreGetCount(semaphore: SemaphoreHandle_t) -> UBaseType_t {
  lock_unpoisoned(&(*semaphore).state).value
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mutex_give_requires_holder() {
    unsafe {
      let mutex = xSemaphoreCreateMutex();
      assert_eq!(xSemaphoreGive(mutex), errQUEUE_FULL);
      assert_eq!(xSemaphoreTake(mutex, 0), pdTRUE);
      assert_eq!(xSemaphoreTake(mutex, 1), pdFALSE);

      let address = mutex as usize;
      let other = std::thread::spawn(move || xSemaphoreGive(address as SemaphoreHandle_t));
      assert_eq!(other.join().unwrap(), errQUEUE_FULL);

      assert_eq!(xSemaphoreGive(mutex), pdTRUE);
      vSemaphoreDelete(mutex);
    }
  }

  #[test]
  fn counting_respects_bounds() {
    unsafe {
      let semaphore = xSemaphoreCreateCounting(2, 1);
      assert_eq!(uxSemaphoreGetCount(semaphore), 1);
      assert_eq!(xSemaphoreGive(semaphore), pdTRUE);
      assert_eq!(xSemaphoreGive(semaphore), errQUEUE_FULL);

      let mut woken = pdFALSE;
      assert_eq!(xSemaphoreTakeFromISR(semaphore, &mut woken), pdTRUE);
      assert_eq!(xSemaphoreTakeFromISR(semaphore, &mut woken), pdTRUE);
      assert_eq!(xSemaphoreTakeFromISR(semaphore, &mut woken), pdFALSE);
      vSemaphoreDelete(semaphore);
    }
  }

  #[test]
  fn invalid_counts_are_rejected() {
    unsafe {
      assert!(xSemaphoreCreateCounting(0, 0).is_null());
      assert!(xSemaphoreCreateCounting(1, 2).is_null());
    }
  }
}
