use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ffi::{c_char, c_void, CString};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Instant;

use super::{
  allocation_fails, block_on, copy_name, lock_unpoisoned, now_ticks, wait_for_cpu,
  configTASK_NOTIFICATION_ARRAY_ENTRIES, errCOULD_NOT_ALLOCATE_REQUIRED_MEMORY,
  BaseType_t, StackType_t, TaskFunction_t, TickType_t, UBaseType_t,
  pdFALSE, pdPASS, pdTRUE, POLL_INTERVAL, ticks_to_duration,
};

pub type eTaskState = u32;
pub const eTaskState_eRunning: eTaskState = 0;
pub const eTaskState_eReady: eTaskState = 1;
pub const eTaskState_eBlocked: eTaskState = 2;
pub const eTaskState_eSuspended: eTaskState = 3;
pub const eTaskState_eDeleted: eTaskState = 4;
pub const eTaskState_eInvalid: eTaskState = 5;

const NOTIFICATION_ENTRIES: usize = configTASK_NOTIFICATION_ARRAY_ENTRIES as usize;

/// Task control block of the hosted kernel.
pub struct tskTaskControlBlock {
  name: CString,
  priority: UBaseType_t,
  control: Mutex<Control>,
  changed: Condvar,
  notifications: Mutex<[u32; NOTIFICATION_ENTRIES]>,
  notified: Condvar,
}

pub type TaskHandle_t = *mut tskTaskControlBlock;

/// Storage handed to [`xTaskCreateStatic`]; unused by the hosted kernel.
#[repr(C)]
pub struct StaticTask_t {
  _opaque: [usize; 8],
}

#[derive(Default)]
struct Control {
  suspended: bool,
  deleted: bool,
  blocked: bool,
}

static TASKS: Mutex<BTreeMap<usize, Arc<tskTaskControlBlock>>> = Mutex::new(BTreeMap::new());

/// Registration of the task running on the current thread.
struct Current(Arc<tskTaskControlBlock>);

impl Drop for Current {
  fn drop(&mut self) {
    unregister(&self.0);
  }
}

thread_local! {
  static CURRENT: RefCell<Option<Current>> = RefCell::new(None);
}

struct SendPtr(*mut c_void);

unsafe impl Send for SendPtr {}

impl SendPtr {
  fn get(self) -> *mut c_void {
    self.0
  }
}

impl tskTaskControlBlock {
  fn new(name: CString, priority: UBaseType_t) -> Self {
    Self {
      name,
      priority,
      control: Mutex::new(Control::default()),
      changed: Condvar::new(),
      notifications: Mutex::new([0; NOTIFICATION_ENTRIES]),
      notified: Condvar::new(),
    }
  }

  fn handle(self: &Arc<Self>) -> TaskHandle_t {
    Arc::as_ptr(self).cast_mut()
  }

  fn update(&self, f: impl FnOnce(&mut Control)) {
    let mut control = lock_unpoisoned(&self.control);
    f(&mut control);
    self.changed.notify_all();
  }

  /// Stop here while suspended, never return once deleted.
  fn honour_requests(&self) {
    let mut control = lock_unpoisoned(&self.control);
    loop {
      if control.deleted {
        drop(control);
        park_forever()
      }

      if !control.suspended {
        return
      }

      control = self.changed.wait(control).unwrap_or_else(|err| err.into_inner());
    }
  }

  fn state(&self) -> eTaskState {
    let control = lock_unpoisoned(&self.control);
    if control.deleted {
      eTaskState_eDeleted
    } else if control.suspended {
      eTaskState_eSuspended
    } else if control.blocked {
      eTaskState_eBlocked
    } else {
      eTaskState_eReady
    }
  }

  fn give_notification(&self, index: UBaseType_t) {
    let mut notifications = lock_unpoisoned(&self.notifications);
    let value = &mut notifications[index as usize];
    *value = value.wrapping_add(1);
    self.notified.notify_all();
  }
}

fn register(task: tskTaskControlBlock) -> Arc<tskTaskControlBlock> {
  let task = Arc::new(task);
  lock_unpoisoned(&TASKS).insert(task.handle() as usize, Arc::clone(&task));
  task
}

fn unregister(task: &Arc<tskTaskControlBlock>) {
  lock_unpoisoned(&TASKS).remove(&(task.handle() as usize));
}

fn lookup(handle: TaskHandle_t) -> Option<Arc<tskTaskControlBlock>> {
  lock_unpoisoned(&TASKS).get(&(handle as usize)).cloned()
}

pub(super) fn park_forever() -> ! {
  log::trace!("thread {:?} parked after task deletion", thread::current().id());
  loop {
    thread::park();
  }
}

/// The task running on the calling thread, adopting the thread if needed.
pub(super) fn current_task() -> Arc<tskTaskControlBlock> {
  CURRENT.with(|current| {
    let mut current = current.borrow_mut();
    if let Some(Current(task)) = &*current {
      return Arc::clone(task)
    }

    let name = thread::current().name().unwrap_or("adopted").to_owned();
    let name = CString::new(name).unwrap_or_default();
    let task = register(tskTaskControlBlock::new(name, 1));
    log::debug!("adopted thread {:?} as task {:p}", thread::current().id(), Arc::as_ptr(&task));

    *current = Some(Current(Arc::clone(&task)));
    task
  })
}

/// Whether the task running on the calling thread has been deleted.
pub(super) fn current_deleted() -> bool {
  lock_unpoisoned(&current_task().control).deleted
}

/// Called on every kernel entry from task context.
pub(super) fn checkpoint() {
  wait_for_cpu();
  current_task().honour_requests();
}

/// Marks the current task as blocked for as long as it is alive.
pub(super) struct BlockedGuard {
  task: Arc<tskTaskControlBlock>,
}

impl BlockedGuard {
  pub(super) fn new() -> Self {
    let task = current_task();
    task.update(|control| control.blocked = true);
    Self { task }
  }
}

impl Drop for BlockedGuard {
  fn drop(&mut self) {
    self.task.update(|control| control.blocked = false);
  }
}

fn sleep_until(deadline: Instant) {
  let _blocked = BlockedGuard::new();

  loop {
    let now = Instant::now();
    if now >= deadline {
      return
    }

    thread::sleep((deadline - now).min(POLL_INTERVAL));
    checkpoint();
  }
}

fn spawn(
  function: TaskFunction_t,
  name: *const c_char,
  priority: UBaseType_t,
  parameters: *mut c_void,
) -> TaskHandle_t {
  let Some(function) = function else {
    return std::ptr::null_mut()
  };

  let name = unsafe { copy_name(name) }.unwrap_or_default();
  let thread_name = name.to_string_lossy().into_owned();
  let task = register(tskTaskControlBlock::new(name, priority));
  let handle = task.handle();
  let address = handle as usize;
  let parameters = SendPtr(parameters);

  let spawned = {
    let task = Arc::clone(&task);
    thread::Builder::new().name(thread_name).spawn(move || {
      let parameters = parameters.get();
      CURRENT.with(|current| *current.borrow_mut() = Some(Current(task)));
      checkpoint();

      unsafe { function(parameters) };
      log::warn!("task {:#x} returned from its entry function", address);
    })
  };

  match spawned {
    Ok(_) => {
      log::trace!("created task {:p} with priority {}", handle, task.priority);
      handle
    },
    Err(err) => {
      log::error!("failed to spawn task thread: {}", err);
      unregister(&task);
      std::ptr::null_mut()
    },
  }
}

pub unsafe fn xTaskCreate(
  function: TaskFunction_t,
  name: *const c_char,
  _stack_depth: u16,
  parameters: *mut c_void,
  priority: UBaseType_t,
  created_task: *mut TaskHandle_t,
) -> BaseType_t {
  if allocation_fails() {
    return errCOULD_NOT_ALLOCATE_REQUIRED_MEMORY
  }

  let handle = spawn(function, name, priority, parameters);
  if handle.is_null() {
    return errCOULD_NOT_ALLOCATE_REQUIRED_MEMORY
  }

  if !created_task.is_null() {
    *created_task = handle;
  }

  pdPASS
}

pub unsafe fn xTaskCreateStatic(
  function: TaskFunction_t,
  name: *const c_char,
  _stack_depth: u32,
  parameters: *mut c_void,
  priority: UBaseType_t,
  stack_buffer: *mut StackType_t,
  task_buffer: *mut StaticTask_t,
) -> TaskHandle_t {
  if allocation_fails() || stack_buffer.is_null() || task_buffer.is_null() {
    return std::ptr::null_mut()
  }

  spawn(function, name, priority, parameters)
}

pub unsafe fn vTaskDelete(task: TaskHandle_t) {
  let current = current_task();

  if task.is_null() || task == current.handle() {
    log::trace!("task {:p} deleted itself", current.handle());
    current.update(|control| control.deleted = true);
    unregister(&current);
    drop(current);
    park_forever()
  }

  checkpoint();

  if let Some(task) = lookup(task) {
    log::trace!("deleting task {:p}", task.handle());
    task.update(|control| control.deleted = true);
    unregister(&task);
  }
}

pub unsafe fn vTaskSuspend(task: TaskHandle_t) {
  let current = current_task();

  if task.is_null() || task == current.handle() {
    current.update(|control| control.suspended = true);
    checkpoint();
  } else if let Some(task) = lookup(task) {
    task.update(|control| control.suspended = true);
  }
}

pub unsafe fn vTaskResume(task: TaskHandle_t) {
  if let Some(task) = lookup(task) {
    task.update(|control| control.suspended = false);
  }
}

pub unsafe fn eTaskGetState(task: TaskHandle_t) -> eTaskState {
  if task == current_task().handle() {
    return eTaskState_eRunning
  }

  lookup(task).map_or(eTaskState_eDeleted, |task| task.state())
}

pub unsafe fn xTaskGetCurrentTaskHandle() -> TaskHandle_t {
  current_task().handle()
}

pub unsafe fn pcTaskGetName(task: TaskHandle_t) -> *mut c_char {
  let task = if task.is_null() { current_task().handle() } else { task };
  (*task).name.as_ptr().cast_mut()
}

pub unsafe fn vTaskDelay(ticks: TickType_t) {
  checkpoint();

  if ticks == 0 {
    thread::yield_now();
  } else {
    sleep_until(Instant::now() + ticks_to_duration(ticks));
  }
}

pub unsafe fn vTaskDelayUntil(previous_wake_time: *mut TickType_t, increment: TickType_t) {
  checkpoint();

  let now = now_ticks();
  let previous = *previous_wake_time;
  let wake_time = previous.wrapping_add(increment);

  let should_delay = if now < previous {
    // The tick count overflowed since the previous wake time.
    wake_time < previous && wake_time > now
  } else {
    wake_time < previous || wake_time > now
  };

  *previous_wake_time = wake_time;

  if should_delay {
    sleep_until(Instant::now() + ticks_to_duration(wake_time.wrapping_sub(now)));
  } else {
    thread::yield_now();
  }
}

pub unsafe fn xTaskNotifyGive(task: TaskHandle_t) -> BaseType_t {
  xTaskNotifyGiveIndexed(task, 0)
}

pub unsafe fn xTaskNotifyGiveIndexed(task: TaskHandle_t, index: UBaseType_t) -> BaseType_t {
  checkpoint();

  if let Some(task) = lookup(task) {
    task.give_notification(index);
  }

  pdPASS
}

pub unsafe fn vTaskNotifyGiveFromISR(task: TaskHandle_t, woken: *mut BaseType_t) {
  vTaskNotifyGiveIndexedFromISR(task, 0, woken)
}

pub unsafe fn vTaskNotifyGiveIndexedFromISR(task: TaskHandle_t, index: UBaseType_t, woken: *mut BaseType_t) {
  if let Some(task) = lookup(task) {
    task.give_notification(index);

    if !woken.is_null() {
      *woken = pdTRUE;
    }
  }
}

pub unsafe fn ulTaskNotifyTake(clear_on_exit: BaseType_t, ticks: TickType_t) -> u32 {
  ulTaskNotifyTakeIndexed(0, clear_on_exit, ticks)
}

pub unsafe fn ulTaskNotifyTakeIndexed(index: UBaseType_t, clear_on_exit: BaseType_t, ticks: TickType_t) -> u32 {
  checkpoint();

  let task = current_task();
  let mut taken = 0;

  block_on(&task.notifications, &task.notified, ticks, |notifications| {
    let value = &mut notifications[index as usize];
    if *value == 0 {
      return false
    }

    taken = *value;
    *value = if clear_on_exit != pdFALSE { 0 } else { *value - 1 };
    true
  });

  taken
}

#[cfg(test)]
mod tests {
  use super::*;

  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  static COUNTER: AtomicUsize = AtomicUsize::new(0);

  unsafe extern "C" fn count_and_wait(_: *mut c_void) {
    loop {
      COUNTER.fetch_add(1, Ordering::SeqCst);
      vTaskDelay(1);
    }
  }

  fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
      assert!(Instant::now() < deadline, "condition not reached in time");
      thread::sleep(Duration::from_millis(1));
    }
  }

  #[test]
  fn adopted_thread_is_running() {
    unsafe {
      let me = xTaskGetCurrentTaskHandle();
      assert_eq!(eTaskGetState(me), eTaskState_eRunning);
    }
  }

  #[test]
  fn suspend_resume_delete() {
    unsafe {
      let mut handle = std::ptr::null_mut();
      let res = xTaskCreate(Some(count_and_wait), b"counter\0".as_ptr().cast(), 128, std::ptr::null_mut(), 1, &mut handle);
      assert_eq!(res, pdPASS);

      wait_for(|| COUNTER.load(Ordering::SeqCst) > 0);

      vTaskSuspend(handle);
      assert_eq!(eTaskGetState(handle), eTaskState_eSuspended);
      thread::sleep(Duration::from_millis(10));
      let frozen = COUNTER.load(Ordering::SeqCst);
      thread::sleep(Duration::from_millis(20));
      assert_eq!(COUNTER.load(Ordering::SeqCst), frozen);

      vTaskResume(handle);
      wait_for(|| COUNTER.load(Ordering::SeqCst) > frozen);

      vTaskDelete(handle);
      assert_eq!(eTaskGetState(handle), eTaskState_eDeleted);
    }
  }

  #[test]
  fn notification_take_counts_down() {
    unsafe {
      let me = xTaskGetCurrentTaskHandle();
      xTaskNotifyGiveIndexed(me, 1);
      xTaskNotifyGiveIndexed(me, 1);

      assert_eq!(ulTaskNotifyTakeIndexed(1, pdFALSE, 0), 2);
      assert_eq!(ulTaskNotifyTakeIndexed(1, pdTRUE, 0), 1);
      assert_eq!(ulTaskNotifyTakeIndexed(1, pdTRUE, 0), 0);
    }
  }

  #[test]
  fn delay_until_keeps_cadence() {
    unsafe {
      let mut wake = now_ticks();
      let start = wake;
      for _ in 0..3 {
        vTaskDelayUntil(&mut wake, 5);
      }
      assert_eq!(wake, start + 15);
      assert!(now_ticks() >= start + 15);
    }
  }
}
