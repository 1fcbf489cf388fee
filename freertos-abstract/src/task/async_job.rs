use core::fmt;

use alloc2::boxed::Box;

use crate::sync::BinarySemaphore;
use crate::WAIT_FOREVER;

use super::{Task, TaskPriority};

/// Runs a job on its own task and joins it when dropped.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// use freertos_abstract::task::AsyncJob;
///
/// let counter = Arc::new(AtomicU32::new(0));
///
/// {
///   let counter = Arc::clone(&counter);
///   let _job = AsyncJob::spawn(move || {
///     counter.fetch_add(1, Ordering::Relaxed);
///   });
/// }
///
/// assert_eq!(counter.load(Ordering::Relaxed), 1);
/// ```
#[must_use = "the job is joined immediately if unused"]
pub struct AsyncJob {
  task: Task,
  // Given by the task as the very last thing the job does.
  done: Box<BinarySemaphore>,
}

/// The job's side of the completion signal.
struct Completion(*const BinarySemaphore);

unsafe impl Send for Completion {}

impl Completion {
  fn signal(self) {
    // SAFETY: The semaphore is only dropped after it was given.
    let _ = unsafe { &*self.0 }.give();
  }
}

impl AsyncJob {
  /// Run `job` on a new task one priority level above idle.
  #[track_caller]
  pub fn spawn<F>(job: F) -> Self
  where
    F: FnOnce() + Send + 'static,
  {
    Self::with_priority(job, TaskPriority::default())
  }

  /// Run `job` on a new task with the given priority.
  ///
  /// Failing to create the task is fatal.
  #[track_caller]
  pub fn with_priority<F>(job: F, priority: TaskPriority) -> Self
  where
    F: FnOnce() + Send + 'static,
  {
    let done = Box::new(BinarySemaphore::new());
    let completion = Completion(&*done);

    let task = Task::new().name("async_job").priority(priority).start(move |_| {
      job();
      completion.signal();
    });

    Self { task, done }
  }

  /// Whether the job has finished, without waiting for it.
  pub fn is_finished(&self) -> bool {
    self.done.is_given()
  }

  /// Wait for the job to finish.
  pub fn join(self) {
    drop(self)
  }
}

impl fmt::Debug for AsyncJob {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AsyncJob")
      .field("task", &self.task)
      .field("finished", &self.is_finished())
      .finish()
  }
}

impl Drop for AsyncJob {
  fn drop(&mut self) {
    while self.done.take(WAIT_FOREVER).is_err() {}
    log::trace!("joined async job {:?}", self.task.name());
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  #[test]
  fn drop_waits_for_the_job() {
    let counter = Arc::new(AtomicU32::new(0));

    let job = {
      let counter = Arc::clone(&counter);
      AsyncJob::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        counter.fetch_add(1, Ordering::SeqCst);
      })
    };
    drop(job);

    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn is_finished_does_not_consume() {
    let job = AsyncJob::spawn(|| {});

    while !job.is_finished() {
      std::thread::sleep(Duration::from_millis(1));
    }
    assert!(job.is_finished());

    job.join();
  }
}
