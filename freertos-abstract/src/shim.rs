#![allow(non_snake_case)]

//! Kernel API as used by the rest of the crate.
//!
//! With `cfg(freertos_kernel)` these are the generated FreeRTOS bindings plus
//! wrappers around the C shim for everything the kernel only provides as a
//! macro. Otherwise the hosted kernel provides the same names.

#[cfg(not(freertos_kernel))]
pub use crate::hosted::*;

#[cfg(freertos_kernel)]
pub use self::freertos::*;

#[cfg(freertos_kernel)]
mod freertos {
  #[cfg(feature = "static_allocation")]
  use core::mem::MaybeUninit;
  #[cfg(feature = "static_allocation")]
  use core::ptr;

  mod bindings {
    #![allow(unused)]
    #![allow(missing_docs)]
    #![allow(non_upper_case_globals)]
    #![allow(non_camel_case_types)]
    #![allow(non_snake_case)]

    include!(concat!(env!("OUT_DIR"), "/shim.rs"));
  }

  pub use bindings::*;
  use bindings as b;

  pub const configTICK_RATE_HZ: TickType_t = b::RS_configTICK_RATE_HZ as TickType_t;
  pub const configMINIMAL_STACK_SIZE: u16 = b::RS_configMINIMAL_STACK_SIZE as u16;
  pub const configTIMER_TASK_STACK_DEPTH: u16 = b::RS_configTIMER_TASK_STACK_DEPTH as u16;
  pub const configMAX_PRIORITIES: UBaseType_t = b::RS_configMAX_PRIORITIES as UBaseType_t;
  pub const configMAX_TASK_NAME_LEN: usize = b::RS_configMAX_TASK_NAME_LEN as usize;
  pub const configTASK_NOTIFICATION_ARRAY_ENTRIES: UBaseType_t = b::RS_configTASK_NOTIFICATION_ARRAY_ENTRIES as UBaseType_t;
  pub const tskIDLE_PRIORITY: UBaseType_t = b::RS_tskIDLE_PRIORITY as UBaseType_t;
  pub const pdFALSE: BaseType_t = b::RS_pdFALSE as BaseType_t;
  pub const pdTRUE: BaseType_t = b::RS_pdTRUE as BaseType_t;
  pub const pdFAIL: BaseType_t = b::RS_pdFAIL as BaseType_t;
  pub const pdPASS: BaseType_t = b::RS_pdPASS as BaseType_t;
  pub const errQUEUE_FULL: BaseType_t = b::RS_errQUEUE_FULL as BaseType_t;
  pub const errQUEUE_EMPTY: BaseType_t = b::RS_errQUEUE_EMPTY as BaseType_t;
  pub const errCOULD_NOT_ALLOCATE_REQUIRED_MEMORY: BaseType_t = b::RS_errCOULD_NOT_ALLOCATE_REQUIRED_MEMORY as BaseType_t;
  pub const portMAX_DELAY: TickType_t = b::RS_portMAX_DELAY as TickType_t;
  pub const taskSCHEDULER_SUSPENDED: BaseType_t = b::RS_taskSCHEDULER_SUSPENDED as BaseType_t;
  pub const taskSCHEDULER_NOT_STARTED: BaseType_t = b::RS_taskSCHEDULER_NOT_STARTED as BaseType_t;
  pub const taskSCHEDULER_RUNNING: BaseType_t = b::RS_taskSCHEDULER_RUNNING as BaseType_t;

  pub unsafe fn xSemaphoreCreateMutex() -> SemaphoreHandle_t {
    b::freertos_rs_semaphore_create_mutex()
  }

  pub unsafe fn xSemaphoreCreateBinary() -> SemaphoreHandle_t {
    b::freertos_rs_semaphore_create_binary()
  }

  pub unsafe fn xSemaphoreCreateCounting(max: UBaseType_t, initial: UBaseType_t) -> SemaphoreHandle_t {
    b::freertos_rs_semaphore_create_counting(max, initial)
  }

  #[cfg(feature = "static_allocation")]
  pub unsafe fn xSemaphoreCreateMutexStatic(buffer: *mut StaticSemaphore_t) -> SemaphoreHandle_t {
    b::freertos_rs_semaphore_create_mutex_static(buffer)
  }

  #[cfg(feature = "static_allocation")]
  pub unsafe fn xSemaphoreCreateBinaryStatic(buffer: *mut StaticSemaphore_t) -> SemaphoreHandle_t {
    b::freertos_rs_semaphore_create_binary_static(buffer)
  }

  #[cfg(feature = "static_allocation")]
  pub unsafe fn xSemaphoreCreateCountingStatic(
    max: UBaseType_t,
    initial: UBaseType_t,
    buffer: *mut StaticSemaphore_t,
  ) -> SemaphoreHandle_t {
    b::freertos_rs_semaphore_create_counting_static(max, initial, buffer)
  }

  pub unsafe fn vSemaphoreDelete(semaphore: SemaphoreHandle_t) {
    b::freertos_rs_semaphore_delete(semaphore)
  }

  pub unsafe fn xSemaphoreTake(semaphore: SemaphoreHandle_t, ticks: TickType_t) -> BaseType_t {
    b::freertos_rs_semaphore_take(semaphore, ticks)
  }

  pub unsafe fn xSemaphoreGive(semaphore: SemaphoreHandle_t) -> BaseType_t {
    b::freertos_rs_semaphore_give(semaphore)
  }

  pub unsafe fn xSemaphoreTakeFromISR(semaphore: SemaphoreHandle_t, woken: *mut BaseType_t) -> BaseType_t {
    b::freertos_rs_semaphore_take_from_isr(semaphore, woken)
  }

  pub unsafe fn xSemaphoreGiveFromISR(semaphore: SemaphoreHandle_t, woken: *mut BaseType_t) -> BaseType_t {
    b::freertos_rs_semaphore_give_from_isr(semaphore, woken)
  }

  pub unsafe fn uxSemaphoreGetCount(semaphore: SemaphoreHandle_t) -> UBaseType_t {
    b::freertos_rs_semaphore_get_count(semaphore)
  }

  pub unsafe fn taskYIELD() {
    b::freertos_rs_yield()
  }

  pub unsafe fn taskENTER_CRITICAL() {
    b::freertos_rs_enter_critical()
  }

  pub unsafe fn taskEXIT_CRITICAL() {
    b::freertos_rs_exit_critical()
  }

  pub unsafe fn taskENTER_CRITICAL_FROM_ISR() -> UBaseType_t {
    b::freertos_rs_enter_critical_from_isr()
  }

  pub unsafe fn taskEXIT_CRITICAL_FROM_ISR(saved: UBaseType_t) {
    b::freertos_rs_exit_critical_from_isr(saved)
  }

  pub unsafe fn portYIELD_FROM_ISR(woken: BaseType_t) {
    b::freertos_rs_yield_from_isr(woken)
  }

  pub unsafe fn vTaskDelayUntil(previous_wake_time: *mut TickType_t, increment: TickType_t) {
    b::freertos_rs_delay_until(previous_wake_time, increment)
  }

  pub unsafe fn xTaskNotifyGive(task: TaskHandle_t) -> BaseType_t {
    b::freertos_rs_task_notify_give(task)
  }

  pub unsafe fn xTaskNotifyGiveIndexed(task: TaskHandle_t, index: UBaseType_t) -> BaseType_t {
    b::freertos_rs_task_notify_give_indexed(task, index)
  }

  pub unsafe fn vTaskNotifyGiveFromISR(task: TaskHandle_t, woken: *mut BaseType_t) {
    b::freertos_rs_task_notify_give_from_isr(task, woken)
  }

  pub unsafe fn vTaskNotifyGiveIndexedFromISR(task: TaskHandle_t, index: UBaseType_t, woken: *mut BaseType_t) {
    b::freertos_rs_task_notify_give_indexed_from_isr(task, index, woken)
  }

  pub unsafe fn ulTaskNotifyTake(clear_on_exit: BaseType_t, ticks: TickType_t) -> u32 {
    b::freertos_rs_task_notify_take(clear_on_exit, ticks)
  }

  pub unsafe fn ulTaskNotifyTakeIndexed(index: UBaseType_t, clear_on_exit: BaseType_t, ticks: TickType_t) -> u32 {
    b::freertos_rs_task_notify_take_indexed(index, clear_on_exit, ticks)
  }

  pub unsafe fn xTimerStart(timer: TimerHandle_t, ticks: TickType_t) -> BaseType_t {
    b::freertos_rs_timer_start(timer, ticks)
  }

  pub unsafe fn xTimerStop(timer: TimerHandle_t, ticks: TickType_t) -> BaseType_t {
    b::freertos_rs_timer_stop(timer, ticks)
  }

  pub unsafe fn xTimerReset(timer: TimerHandle_t, ticks: TickType_t) -> BaseType_t {
    b::freertos_rs_timer_reset(timer, ticks)
  }

  pub unsafe fn xTimerChangePeriod(timer: TimerHandle_t, period: TickType_t, ticks: TickType_t) -> BaseType_t {
    b::freertos_rs_timer_change_period(timer, period, ticks)
  }

  pub unsafe fn xTimerDelete(timer: TimerHandle_t, ticks: TickType_t) -> BaseType_t {
    b::freertos_rs_timer_delete(timer, ticks)
  }

  pub unsafe fn xTimerStartFromISR(timer: TimerHandle_t, woken: *mut BaseType_t) -> BaseType_t {
    b::freertos_rs_timer_start_from_isr(timer, woken)
  }

  pub unsafe fn xTimerStopFromISR(timer: TimerHandle_t, woken: *mut BaseType_t) -> BaseType_t {
    b::freertos_rs_timer_stop_from_isr(timer, woken)
  }

  #[no_mangle]
  extern "C" fn vApplicationMallocFailedHook() {
    crate::assert::fatal("heap allocation failed");
  }

  #[cfg(feature = "static_allocation")]
  #[no_mangle]
  unsafe extern "C" fn vApplicationGetIdleTaskMemory(
    tcb_buffer: *mut *mut StaticTask_t,
    stack_buffer: *mut *mut StackType_t,
    stack_size: *mut u32,
  ) {
    static mut IDLE_TASK_TCB: MaybeUninit<StaticTask_t> = MaybeUninit::uninit();
    static mut IDLE_TASK_STACK: [MaybeUninit<StackType_t>; configMINIMAL_STACK_SIZE as usize] =
      [MaybeUninit::uninit(); configMINIMAL_STACK_SIZE as usize];

    *tcb_buffer = ptr::addr_of_mut!(IDLE_TASK_TCB).cast();
    *stack_buffer = ptr::addr_of_mut!(IDLE_TASK_STACK).cast();
    // In words, not bytes.
    *stack_size = configMINIMAL_STACK_SIZE.into();
  }

  #[cfg(feature = "static_allocation")]
  #[no_mangle]
  unsafe extern "C" fn vApplicationGetTimerTaskMemory(
    tcb_buffer: *mut *mut StaticTask_t,
    stack_buffer: *mut *mut StackType_t,
    stack_size: *mut u32,
  ) {
    static mut TIMER_TASK_TCB: MaybeUninit<StaticTask_t> = MaybeUninit::uninit();
    static mut TIMER_TASK_STACK: [MaybeUninit<StackType_t>; configTIMER_TASK_STACK_DEPTH as usize] =
      [MaybeUninit::uninit(); configTIMER_TASK_STACK_DEPTH as usize];

    *tcb_buffer = ptr::addr_of_mut!(TIMER_TASK_TCB).cast();
    *stack_buffer = ptr::addr_of_mut!(TIMER_TASK_STACK).cast();
    *stack_size = configTIMER_TASK_STACK_DEPTH.into();
  }
}
