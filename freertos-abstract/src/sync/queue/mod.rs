use core::cell::UnsafeCell;
use core::fmt;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::{FreeRtosError, WAIT_FOREVER};

use super::{CountingSemaphore, Mutex};

mod consumer;
pub use consumer::Consumer;

/// A bounded multi-producer, single-consumer queue.
///
/// Elements are constructed in place inside the queue's own ring buffer of
/// `N` slots. One slot is always kept free to tell a full buffer from an
/// empty one, so at most `N - 1` elements are live at any time.
///
/// Producers are serialized with an internal [`Mutex`] and must run in task
/// context. Reading is done through the single [`Consumer`] handed out by
/// [`Queue::consumer`].
///
/// # Examples
///
/// ```
/// use core::time::Duration;
/// use freertos_abstract::sync::Queue;
///
/// let queue = Queue::<u32, 4>::new();
/// assert_eq!(queue.capacity(), 3);
///
/// for i in 1..=3 {
///   queue.try_push_back(i).unwrap();
/// }
/// assert_eq!(queue.try_push_back(4), Err(4));
///
/// let mut consumer = queue.consumer().unwrap();
/// assert_eq!(consumer.front(Duration::ZERO), Some(&1));
/// assert!(consumer.pop());
/// ```
pub struct Queue<T, const N: usize = 2> {
  slots: [UnsafeCell<MaybeUninit<T>>; N],
  read: AtomicUsize,
  write: AtomicUsize,
  producers: Mutex,
  /// Published elements not yet claimed by the consumer.
  available: CountingSemaphore,
  consumer_taken: AtomicBool,
}

unsafe impl<T: Send, const N: usize> Send for Queue<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for Queue<T, N> {}

impl<T, const N: usize> Queue<T, N> {
  const VALID_CAPACITY: () = assert!(N >= 2, "a queue needs at least two slots");

  /// Create a new, empty queue.
  ///
  /// Failing to create the kernel objects backing the queue is fatal.
  #[track_caller]
  pub fn new() -> Self {
    #[allow(clippy::let_unit_value)]
    let () = Self::VALID_CAPACITY;

    Self {
      slots: core::array::from_fn(|_| UnsafeCell::new(MaybeUninit::uninit())),
      read: AtomicUsize::new(0),
      write: AtomicUsize::new(0),
      producers: Mutex::new(),
      available: CountingSemaphore::new(0, N),
      consumer_taken: AtomicBool::new(false),
    }
  }

  /// Maximum number of live elements, `N - 1`.
  #[inline]
  pub const fn capacity(&self) -> usize {
    N - 1
  }

  /// Number of live elements.
  #[inline]
  pub fn len(&self) -> usize {
    let read = self.read.load(Ordering::Acquire);
    let write = self.write.load(Ordering::Acquire);
    (write + N - read) % N
  }

  /// Whether there are no live elements.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Construct an element at the back of the queue.
  ///
  /// `f` is only called if there is space for the element.
  ///
  /// # Errors
  ///
  /// Returns [`FreeRtosError::QueueFull`] without calling `f` if the queue is full.
  pub fn try_emplace_back<F>(&self, f: F) -> Result<(), FreeRtosError>
  where
    F: FnOnce() -> T,
  {
    self.emplace(f).map_err(|_| FreeRtosError::QueueFull)
  }

  /// Move `item` to the back of the queue.
  ///
  /// # Errors
  ///
  /// Returns the item if the queue is full.
  pub fn try_push_back(&self, item: T) -> Result<(), T> {
    self.emplace(move || item).map_err(|f| f())
  }

  /// Hands `f` back if the queue is full.
  fn emplace<F>(&self, f: F) -> Result<(), F>
  where
    F: FnOnce() -> T,
  {
    let Ok(producer) = self.producers.guard(WAIT_FOREVER) else {
      return Err(f)
    };

    let write = self.write.load(Ordering::Relaxed);
    let next = (write + 1) % N;
    if next == self.read.load(Ordering::Acquire) {
      return Err(f)
    }

    // SAFETY: The slot at `write` is free and only producers, which are
    // serialized, write to it.
    unsafe { self.slot_mut(write).write(f()) };
    self.write.store(next, Ordering::Release);
    drop(producer);

    if self.available.give().is_err() {
      log::warn!("queue semaphore overflow after publishing an element");
    }

    Ok(())
  }

  /// Get the consumer of this queue.
  ///
  /// Returns `None` while another [`Consumer`] is alive.
  pub fn consumer(&self) -> Option<Consumer<'_, T, N>> {
    if self.consumer_taken.swap(true, Ordering::AcqRel) {
      return None
    }

    Some(Consumer::new(self))
  }

  /// # Safety
  ///
  /// The slot at `index` must hold a live element.
  unsafe fn slot(&self, index: usize) -> &MaybeUninit<T> {
    &*self.slots[index].get()
  }

  /// # Safety
  ///
  /// Nobody else may access the slot at `index`.
  unsafe fn slot_mut(&self, index: usize) -> &mut MaybeUninit<T> {
    &mut *self.slots[index].get()
  }
}

impl<T, const N: usize> Default for Queue<T, N> {
  #[track_caller]
  fn default() -> Self {
    Self::new()
  }
}

impl<T, const N: usize> fmt::Debug for Queue<T, N> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Queue")
      .field("len", &self.len())
      .field("capacity", &self.capacity())
      .finish()
  }
}

impl<T, const N: usize> Drop for Queue<T, N> {
  fn drop(&mut self) {
    let write = *self.write.get_mut();
    let mut read = *self.read.get_mut();

    while read != write {
      unsafe { self.slot_mut(read).assume_init_drop() };
      read = (read + 1) % N;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use core::time::Duration;
  use std::rc::Rc;
  use std::sync::Arc;
  use std::thread;

  use quickcheck_macros::quickcheck;

  use crate::sync::BinarySemaphore;

  #[test]
  fn capacity_is_one_less_than_slots() {
    let queue = Queue::<u8, 4>::new();
    assert_eq!(queue.capacity(), 3);

    for i in 1..=3 {
      queue.try_push_back(i).unwrap();
    }
    assert_eq!(queue.len(), 3);
    assert_eq!(queue.try_push_back(4), Err(4));

    let mut consumer = queue.consumer().unwrap();
    assert_eq!(consumer.front(Duration::ZERO), Some(&1));
    assert!(consumer.pop());

    queue.try_push_back(4).unwrap();

    let mut live = Vec::new();
    while let Some(&item) = consumer.front(Duration::ZERO) {
      live.push(item);
      assert!(consumer.pop());
    }
    assert_eq!(live, [2, 3, 4]);
  }

  #[test]
  fn full_queue_does_not_construct() {
    let queue = Queue::<u8, 2>::new();
    queue.try_emplace_back(|| 1).unwrap();

    let mut called = false;
    let result = queue.try_emplace_back(|| {
      called = true;
      2
    });

    assert_eq!(result, Err(FreeRtosError::QueueFull));
    assert!(!called);
    assert_eq!(queue.len(), 1);
  }

  #[test]
  fn front_on_empty_returns_immediately() {
    let queue = Queue::<u8>::new();
    let mut consumer = queue.consumer().unwrap();

    assert_eq!(consumer.front(Duration::ZERO), None);
    assert!(!consumer.pop());
  }

  #[test]
  fn pushed_element_is_visible_once_the_push_returned() {
    let queue = Arc::new(Queue::<u32, 3>::new());
    let pushed = Arc::new(BinarySemaphore::new());
    let consumed = Arc::new(BinarySemaphore::new());

    let producer = {
      let queue = Arc::clone(&queue);
      let pushed = Arc::clone(&pushed);
      let consumed = Arc::clone(&consumed);
      thread::spawn(move || {
        for i in 0..50 {
          queue.try_push_back(i).unwrap();
          pushed.give().unwrap();
          consumed.take(Duration::MAX).unwrap();
        }
      })
    };

    let mut consumer = queue.consumer().unwrap();
    for i in 0..50 {
      pushed.take(Duration::MAX).unwrap();
      assert_eq!(consumer.front(Duration::ZERO), Some(&i));
      assert!(consumer.pop());
      consumed.give().unwrap();
    }

    producer.join().unwrap();
  }

  #[test]
  fn front_does_not_remove() {
    let queue = Queue::<u8, 3>::new();
    queue.try_push_back(7).unwrap();

    let mut consumer = queue.consumer().unwrap();
    assert_eq!(consumer.front(Duration::ZERO), Some(&7));
    assert_eq!(consumer.front(Duration::ZERO), Some(&7));
    assert_eq!(queue.len(), 1);
  }

  #[test]
  fn only_one_consumer() {
    let queue = Queue::<u8>::new();
    let consumer = queue.consumer().unwrap();
    assert!(queue.consumer().is_none());
    drop(consumer);
    assert!(queue.consumer().is_some());
  }

  #[test]
  fn dropped_consumer_releases_claimed_element() {
    let queue = Queue::<u8, 3>::new();
    queue.try_push_back(1).unwrap();

    {
      let mut consumer = queue.consumer().unwrap();
      assert_eq!(consumer.front(Duration::ZERO), Some(&1));
    }

    let mut consumer = queue.consumer().unwrap();
    assert_eq!(consumer.front(Duration::ZERO), Some(&1));
  }

  #[test]
  fn drop_releases_live_elements() {
    let item = Rc::new(());

    {
      let queue = Queue::<Rc<()>, 4>::new();
      queue.try_push_back(Rc::clone(&item)).unwrap();
      queue.try_push_back(Rc::clone(&item)).unwrap();
      assert_eq!(Rc::strong_count(&item), 3);
    }

    assert_eq!(Rc::strong_count(&item), 1);
  }

  #[test]
  fn front_waits_for_producer() {
    let queue = Arc::new(Queue::<u32, 4>::new());

    let producer = {
      let queue = Arc::clone(&queue);
      thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        queue.try_push_back(42).unwrap();
      })
    };

    let mut consumer = queue.consumer().unwrap();
    assert_eq!(consumer.front(Duration::from_secs(5)), Some(&42));
    drop(consumer);

    producer.join().unwrap();
  }

  #[quickcheck]
  fn fifo_order(items: Vec<u8>) -> bool {
    let queue = Queue::<u8, 8>::new();
    let mut consumer = queue.consumer().unwrap();
    let mut popped = Vec::new();

    for chunk in items.chunks(queue.capacity()) {
      for &item in chunk {
        if queue.try_push_back(item).is_err() {
          return false
        }
      }

      while let Some(&item) = consumer.front(Duration::ZERO) {
        popped.push(item);
        consumer.pop();
      }
    }

    popped == items
  }

  #[quickcheck]
  fn never_more_than_capacity(pushes: u8) -> bool {
    let queue = Queue::<u8, 5>::new();
    let accepted = (0..pushes).filter(|&i| queue.try_push_back(i).is_ok()).count();
    accepted == usize::from(pushes).min(queue.capacity()) && queue.len() == accepted
  }
}
