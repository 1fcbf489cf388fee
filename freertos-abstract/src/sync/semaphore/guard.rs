use super::SemaphoreHandle;

/// An RAII implementation of a “scoped decrement” of a semaphore.
///
/// When this structure is dropped (falls out of scope), the semaphore is incremented again.
#[must_use = "if unused the semaphore will increment again immediately"]
#[derive(Debug)]
pub struct SemaphoreGuard<'s> {
  pub(super) handle: &'s SemaphoreHandle,
}

impl Drop for SemaphoreGuard<'_> {
  fn drop(&mut self) {
    if self.handle.give().is_err() {
      log::warn!("semaphore {:p} was given while guarded", self.handle.as_ptr());
    }
  }
}
