use std::ffi::{c_char, c_void, CString};
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use super::{
  allocation_fails, checkpoint, copy_name, ticks_to_duration,
  BaseType_t, PendedFunction_t, TickType_t, TimerCallbackFunction_t, UBaseType_t,
  pdFAIL, pdFALSE, pdPASS, pdTRUE,
};

/// Timer control block of the hosted kernel.
pub struct tmrTimerControl {
  name: Option<CString>,
  period: AtomicU32,
  auto_reload: bool,
  id: AtomicPtr<c_void>,
  callback: TimerCallbackFunction_t,
  active: AtomicBool,
}

pub type TimerHandle_t = *mut tmrTimerControl;

/// Storage handed to [`xTimerCreateStatic`]; unused by the hosted kernel.
#[repr(C)]
pub struct StaticTimer_t {
  _opaque: [usize; 8],
}

/// Commands processed by the timer service thread.
enum TimerCmd {
  Start { timer: usize, at: Instant },
  Stop { timer: usize },
  Delete { timer: usize },
  Pend { function: unsafe extern "C" fn(*mut c_void, u32), parameter: usize, value: u32 },
}

static TIMER_CMD_SEND: spin::Mutex<Option<mpsc::Sender<TimerCmd>>> = spin::Mutex::new(None);

fn send(cmd: TimerCmd) -> BaseType_t {
  let mut sender = TIMER_CMD_SEND.lock();
  let sender = sender.get_or_insert_with(start_service);

  match sender.send(cmd) {
    Ok(()) => pdPASS,
    Err(_) => {
      log::error!("timer service is not running");
      pdFAIL
    },
  }
}

fn start_service() -> mpsc::Sender<TimerCmd> {
  let (timer_cmd_send, timer_cmd_recv) = mpsc::channel();
  log::trace!("starting the timer service");

  let spawned = thread::Builder::new()
    .name("Tmr Svc".to_owned())
    .spawn(move || TimerService::default().run(timer_cmd_recv));

  if let Err(err) = spawned {
    log::error!("failed to spawn the timer service: {}", err);
  }

  timer_cmd_send
}

#[derive(Default)]
struct TimerService {
  /// Armed timers and their next expiry.
  armed: Vec<(Instant, usize)>,
}

impl TimerService {
  fn run(mut self, commands: mpsc::Receiver<TimerCmd>) {
    loop {
      let next_deadline = self.armed.iter().map(|(at, _)| *at).min();

      let received = if let Some(next_deadline) = next_deadline {
        commands.recv_timeout(next_deadline.saturating_duration_since(Instant::now()))
      } else {
        commands.recv().map_err(|_| mpsc::RecvTimeoutError::Disconnected)
      };

      match received {
        Err(mpsc::RecvTimeoutError::Disconnected) => break,
        Err(mpsc::RecvTimeoutError::Timeout) => self.expire(),
        Ok(cmd) => self.apply(cmd),
      }
    }
  }

  fn disarm(&mut self, timer: usize) {
    self.armed.retain(|&(_, armed)| armed != timer);
  }

  fn apply(&mut self, cmd: TimerCmd) {
    match cmd {
      TimerCmd::Start { timer, at } => {
        self.disarm(timer);
        let period = unsafe { &*(timer as TimerHandle_t) }.period.load(Ordering::Acquire);
        self.armed.push((at + ticks_to_duration(period), timer));
      },
      TimerCmd::Stop { timer } => self.disarm(timer),
      TimerCmd::Delete { timer } => {
        self.disarm(timer);
        log::trace!("deleting timer {:#x}", timer);
        drop(unsafe { Box::from_raw(timer as TimerHandle_t) });
      },
      TimerCmd::Pend { function, parameter, value } => {
        checkpoint();
        unsafe { function(parameter as *mut c_void, value) };
      },
    }
  }

  fn expire(&mut self) {
    let now = Instant::now();

    let mut expired = Vec::new();
    self.armed.retain(|&(at, timer)| {
      if at <= now {
        expired.push((at, timer));
        false
      } else {
        true
      }
    });
    expired.sort_by_key(|&(at, _)| at);

    for (at, timer) in expired {
      let handle = timer as TimerHandle_t;
      let control = unsafe { &*handle };

      if control.auto_reload {
        let period = ticks_to_duration(control.period.load(Ordering::Acquire));
        self.armed.push((at + period, timer));
      } else {
        control.active.store(false, Ordering::Release);
      }

      checkpoint();
      if let Some(callback) = control.callback {
        unsafe { callback(handle) };
      }
    }
  }
}

fn create(
  name: *const c_char,
  period: TickType_t,
  auto_reload: UBaseType_t,
  id: *mut c_void,
  callback: TimerCallbackFunction_t,
) -> TimerHandle_t {
  if allocation_fails() || period == 0 {
    return std::ptr::null_mut()
  }

  let timer = Box::new(tmrTimerControl {
    name: unsafe { copy_name(name) },
    period: AtomicU32::new(period),
    auto_reload: auto_reload != 0,
    id: AtomicPtr::new(id),
    callback,
    active: AtomicBool::new(false),
  });

  Box::into_raw(timer)
}

pub unsafe fn xTimerCreate(
  name: *const c_char,
  period: TickType_t,
  auto_reload: UBaseType_t,
  id: *mut c_void,
  callback: TimerCallbackFunction_t,
) -> TimerHandle_t {
  create(name, period, auto_reload, id, callback)
}

pub unsafe fn xTimerCreateStatic(
  name: *const c_char,
  period: TickType_t,
  auto_reload: UBaseType_t,
  id: *mut c_void,
  callback: TimerCallbackFunction_t,
  buffer: *mut StaticTimer_t,
) -> TimerHandle_t {
  if buffer.is_null() {
    return std::ptr::null_mut()
  }

  create(name, period, auto_reload, id, callback)
}

fn start(timer: TimerHandle_t) -> BaseType_t {
  unsafe { &*timer }.active.store(true, Ordering::Release);
  send(TimerCmd::Start { timer: timer as usize, at: Instant::now() })
}

fn stop(timer: TimerHandle_t) -> BaseType_t {
  unsafe { &*timer }.active.store(false, Ordering::Release);
  send(TimerCmd::Stop { timer: timer as usize })
}

fn set_woken(woken: *mut BaseType_t) {
  if !woken.is_null() {
    unsafe { *woken = pdTRUE };
  }
}

pub unsafe fn xTimerStart(timer: TimerHandle_t, _ticks: TickType_t) -> BaseType_t {
  checkpoint();
  start(timer)
}

pub unsafe fn xTimerStop(timer: TimerHandle_t, _ticks: TickType_t) -> BaseType_t {
  checkpoint();
  stop(timer)
}

pub unsafe fn xTimerReset(timer: TimerHandle_t, _ticks: TickType_t) -> BaseType_t {
  checkpoint();
  start(timer)
}

pub unsafe fn xTimerChangePeriod(timer: TimerHandle_t, period: TickType_t, _ticks: TickType_t) -> BaseType_t {
  checkpoint();

  if period == 0 {
    return pdFAIL
  }

  (*timer).period.store(period, Ordering::Release);
  start(timer)
}

pub unsafe fn xTimerDelete(timer: TimerHandle_t, _ticks: TickType_t) -> BaseType_t {
  checkpoint();

  (*timer).active.store(false, Ordering::Release);
  send(TimerCmd::Delete { timer: timer as usize })
}

pub unsafe fn xTimerStartFromISR(timer: TimerHandle_t, woken: *mut BaseType_t) -> BaseType_t {
  set_woken(woken);
  start(timer)
}

pub unsafe fn xTimerStopFromISR(timer: TimerHandle_t, woken: *mut BaseType_t) -> BaseType_t {
  set_woken(woken);
  stop(timer)
}

pub unsafe fn xTimerIsTimerActive(timer: TimerHandle_t) -> BaseType_t {
  if (*timer).active.load(Ordering::Acquire) {
    pdTRUE
  } else {
    pdFALSE
  }
}

pub unsafe fn pvTimerGetTimerID(timer: TimerHandle_t) -> *mut c_void {
  (*timer).id.load(Ordering::Acquire)
}

pub unsafe fn pcTimerGetName(timer: TimerHandle_t) -> *const c_char {
  (*timer).name.as_ref().map_or(std::ptr::null(), |name| name.as_ptr())
}

pub unsafe fn xTimerPendFunctionCall(
  function: PendedFunction_t,
  parameter: *mut c_void,
  value: u32,
  _ticks: TickType_t,
) -> BaseType_t {
  let Some(function) = function else {
    return pdFAIL
  };

  send(TimerCmd::Pend { function, parameter: parameter as usize, value })
}

#[cfg(test)]
mod tests {
  use super::*;

  use std::sync::atomic::AtomicUsize;
  use std::time::Duration;

  static FIRED: AtomicUsize = AtomicUsize::new(0);
  static PENDED: AtomicUsize = AtomicUsize::new(0);

  unsafe extern "C" fn count_expiry(_: TimerHandle_t) {
    FIRED.fetch_add(1, Ordering::SeqCst);
  }

  unsafe extern "C" fn pended(_: *mut c_void, value: u32) {
    PENDED.fetch_add(value as usize, Ordering::SeqCst);
  }

  #[test]
  fn one_shot_fires_once() {
    unsafe {
      let timer = xTimerCreate(b"once\0".as_ptr().cast(), 5, pdFALSE as _, std::ptr::null_mut(), Some(count_expiry));
      assert!(!timer.is_null());
      assert_eq!(xTimerStart(timer, 0), pdPASS);
      assert_eq!(xTimerIsTimerActive(timer), pdTRUE);

      thread::sleep(Duration::from_millis(60));
      assert_eq!(FIRED.load(Ordering::SeqCst), 1);
      assert_eq!(xTimerIsTimerActive(timer), pdFALSE);

      assert_eq!(xTimerDelete(timer, 0), pdPASS);
    }
  }

  #[test]
  fn pended_function_runs_on_service() {
    unsafe {
      assert_eq!(xTimerPendFunctionCall(Some(pended), std::ptr::null_mut(), 7, 0), pdPASS);
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while PENDED.load(Ordering::SeqCst) != 7 {
      assert!(Instant::now() < deadline);
      thread::sleep(Duration::from_millis(1));
    }
  }
}
