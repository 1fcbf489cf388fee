use core::fmt;
use core::sync::atomic::Ordering;

use crate::Ticks;

use super::Queue;

/// The reading end of a [`Queue`].
///
/// There is at most one consumer per queue at any time.
pub struct Consumer<'q, T, const N: usize> {
  queue: &'q Queue<T, N>,
  /// Whether the element at the read index was already claimed from the
  /// availability semaphore.
  holding: bool,
}

impl<'q, T, const N: usize> Consumer<'q, T, N> {
  pub(super) fn new(queue: &'q Queue<T, N>) -> Self {
    Self { queue, holding: false }
  }

  /// Get the oldest element without removing it.
  ///
  /// If the queue is empty, this waits at most `timeout` for an element to
  /// arrive. With a zero timeout it returns `None` immediately.
  ///
  /// An element becomes visible here once the push that stored it has
  /// returned. While a push is still in progress, [`Queue::len`] may already
  /// count its element and `front(Duration::ZERO)` may still return `None`.
  pub fn front(&mut self, timeout: impl Into<Ticks>) -> Option<&T> {
    if !self.holding {
      self.queue.available.take(timeout).ok()?;
      self.holding = true;
    }

    let read = self.queue.read.load(Ordering::Relaxed);
    // SAFETY: A claimed element at `read` is live and producers never touch it.
    Some(unsafe { self.queue.slot(read).assume_init_ref() })
  }

  /// Drop the oldest element.
  ///
  /// Returns `false` if there was no element to drop.
  pub fn pop(&mut self) -> bool {
    if !self.holding && self.queue.available.take(Ticks::ZERO).is_err() {
      return false
    }
    self.holding = false;

    let read = self.queue.read.load(Ordering::Relaxed);
    // SAFETY: See `front`.
    unsafe { self.queue.slot_mut(read).assume_init_drop() };
    self.queue.read.store((read + 1) % N, Ordering::Release);

    true
  }
}

impl<T, const N: usize> fmt::Debug for Consumer<'_, T, N> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Consumer").field("queue", self.queue).finish()
  }
}

impl<T, const N: usize> Drop for Consumer<'_, T, N> {
  fn drop(&mut self) {
    if self.holding && self.queue.available.give().is_err() {
      log::warn!("queue semaphore overflow while releasing the consumer");
    }

    self.queue.consumer_taken.store(false, Ordering::Release);
  }
}
