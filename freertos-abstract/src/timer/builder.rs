use alloc2::{boxed::Box, ffi::CString, vec::Vec};

use crate::Ticks;

use super::{Timer, TimerHandle};

/// Helper struct for creating a new timer returned by [`Timer::build`].
#[derive(Debug, Clone)]
pub struct TimerBuilder<'n> {
  pub(super) name: Option<&'n str>,
  pub(super) period: Ticks,
  pub(super) auto_reload: bool,
  pub(super) id: usize,
}

impl<'n> TimerBuilder<'n> {
  /// Set the name of the timer.
  pub fn name<'a>(self, name: &'a str) -> TimerBuilder<'a> {
    TimerBuilder {
      name: Some(name),
      period: self.period,
      auto_reload: self.auto_reload,
      id: self.id,
    }
  }

  /// Set the period of the timer.
  pub fn period(mut self, period: impl Into<Ticks>) -> Self {
    self.period = period.into();
    self
  }

  /// Should the timer be automatically reloaded?
  pub fn auto_reload(mut self, auto_reload: bool) -> Self {
    self.auto_reload = auto_reload;
    self
  }

  /// Set an identifier, see [`Timer::id`].
  pub fn id(mut self, id: usize) -> Self {
    self.id = id;
    self
  }

  /// Create the [`Timer`].
  ///
  /// Note that the newly created timer must be started. The callback runs on
  /// the timer service task. Failing to create the timer, which includes a
  /// zero period, is fatal.
  #[track_caller]
  pub fn create<F>(self, callback: F) -> Timer
  where
    F: Fn(&TimerHandle) + Send + 'static,
  {
    let name = self.name.map(|name| {
      let bytes: Vec<u8> = name.bytes().take_while(|&b| b != 0).collect();
      // No interior NUL after `take_while`.
      CString::new(bytes).unwrap_or_default()
    });

    Timer::create(name, self.period, self.auto_reload, self.id, Box::new(callback))
  }
}
