//! Synchronization primitives and the bounded queue.
//!
//! All blocking operations take a timeout convertible to [`Ticks`](crate::Ticks):
//! `Duration::ZERO` does not block, `Duration::MAX` blocks until the operation
//! completes.
//!
//! # Examples
//!
//! ## Mutex
//!
//! ```
//! use core::time::Duration;
//! use freertos_abstract::sync::Mutex;
//!
//! let m = Mutex::new();
//!
//! {
//!   let _guard = m.guard(Duration::MAX).unwrap();
//!   // ...
//! }
//! ```
//!
//! ## Counting Semaphore
//!
//! ```
//! use core::time::Duration;
//! use freertos_abstract::sync::CountingSemaphore;
//!
//! let s = CountingSemaphore::new(4, 4);
//!
//! let _guard = s.lock(Duration::ZERO).unwrap();
//! assert_eq!(s.count(), 3);
//! ```

mod lock;
mod mutex;
pub use mutex::*;
mod queue;
pub use queue::*;
mod semaphore;
pub use semaphore::*;
