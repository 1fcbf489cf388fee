//! # FreeRTOS abstractions
//!
//! RAII wrappers around the FreeRTOS kernel: mutexes and semaphores with
//! interrupt-safe variants, a bounded single-consumer queue, tasks with
//! notifications, one-shot asynchronous jobs, software timers and drift-free
//! periodic delays. Every wrapper exclusively owns its kernel handle and
//! releases it exactly once when dropped.
//!
//! When the `FREERTOS_SRC` and `FREERTOS_CONFIG` environment variables are set,
//! the build script compiles the kernel together with a small C shim and the
//! crate is `no_std`. Otherwise the kernel API is provided by a hosted
//! simulation on top of `std` threads, which is what the tests and the
//! `hosted` example run on.
//!
//! # Samples
//!
//! Spawning a new task
//!
//! ```
//! use freertos_abstract::task::Task;
//!
//! let task = Task::new().name("hello").start(|_| {
//!   println!("Hello, world!");
//! });
//! # drop(task);
//! ```
//!
//! Queue
//!
//! ```
//! use core::time::Duration;
//! use freertos_abstract::sync::Queue;
//!
//! let queue = Queue::<u32, 4>::new();
//! queue.try_push_back(10).unwrap();
//!
//! let mut consumer = queue.consumer().unwrap();
//! assert_eq!(consumer.front(Duration::MAX), Some(&10));
//! assert!(consumer.pop());
//! ```
//!
//! Mutex
//!
//! ```
//! use core::time::Duration;
//! use freertos_abstract::sync::Mutex;
//!
//! let m = Mutex::new();
//! {
//!   let _guard = m.guard(Duration::MAX).unwrap();
//!   // ...
//! }
//! ```
#![cfg_attr(freertos_kernel, no_std)]
#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

extern crate alloc as alloc2;

pub mod assert;
mod error;
pub mod ffi;
mod shim;

#[cfg(not(freertos_kernel))]
pub mod hosted;

mod alloc;
pub use alloc::Allocator;

#[cfg(feature = "critical-section")]
mod critical_section;

mod delay;
pub use delay::{delay, Delay, TimerDelay};
mod interrupt_context;
pub use interrupt_context::InterruptContext;
mod isr;
pub use isr::Isr;
pub mod sync;
pub mod task;
mod ticks;
pub use ticks::{Ticks, WAIT_FOREVER};
pub mod timer;

pub use crate::error::FreeRtosError;
