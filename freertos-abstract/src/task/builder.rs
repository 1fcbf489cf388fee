use core::{ffi::c_void, sync::atomic::AtomicBool};

use alloc2::boxed::Box;

use crate::assert::fatal;

use super::{terminate, CurrentTask, Task, TaskName, TaskPriority, DEFAULT_STACK_SIZE};

/// Helper for spawning a new task, created with [`Task::new`].
#[derive(Debug, Clone)]
pub struct TaskBuilder<'n> {
  name: &'n str,
  stack_size: u16,
  priority: TaskPriority,
}

impl TaskBuilder<'_> {
  pub(crate) fn new() -> TaskBuilder<'static> {
    TaskBuilder {
      name: "",
      stack_size: DEFAULT_STACK_SIZE,
      priority: TaskPriority::default(),
    }
  }
}

/// What the task function receives as its parameter.
struct Entry {
  function: Box<dyn FnOnce(&CurrentTask) + Send>,
  exited: *const AtomicBool,
}

extern "C" fn task_function(param: *mut c_void) {
  unsafe {
    let Entry { function, exited } = *Box::from_raw(param.cast::<Entry>());

    // NOTE: New scope so that everything is dropped before the task terminates.
    {
      let current = CurrentTask::new(exited);
      function(&current);
    }

    terminate(exited)
  }
}

impl<'n> TaskBuilder<'n> {
  /// Set the task name.
  ///
  /// The name is truncated to `configMAX_TASK_NAME_LEN - 1` bytes.
  pub fn name<'a>(self, name: &'a str) -> TaskBuilder<'a> {
    TaskBuilder {
      name,
      stack_size: self.stack_size,
      priority: self.priority,
    }
  }

  /// Set the stack size in words.
  pub fn stack_size(mut self, stack_size: u16) -> Self {
    self.stack_size = stack_size;
    self
  }

  /// Set the task priority.
  pub fn priority(mut self, priority: TaskPriority) -> Self {
    self.priority = priority;
    self
  }

  /// Create and start the [`Task`].
  ///
  /// When `f` returns, the task terminates itself. Failing to create the task is fatal.
  #[track_caller]
  pub fn start<F>(&self, f: F) -> Task
  where
    F: FnOnce(&CurrentTask) + Send + 'static,
  {
    let name = TaskName::new(self.name);
    let exited = Box::new(AtomicBool::new(false));

    let entry = Box::into_raw(Box::new(Entry {
      function: Box::new(f),
      exited: &*exited,
    }));

    #[cfg(not(feature = "static_allocation"))]
    let handle = {
      use crate::shim::{pdPASS, xTaskCreate};

      let mut handle = core::ptr::null_mut();
      let res = unsafe {
        xTaskCreate(
          Some(task_function),
          name.as_ptr(),
          self.stack_size as _,
          entry.cast(),
          self.priority.to_freertos(),
          &mut handle,
        )
      };

      if res != pdPASS {
        handle = core::ptr::null_mut();
      }
      handle
    };

    #[cfg(feature = "static_allocation")]
    let (handle, storage) = {
      use crate::shim::xTaskCreateStatic;

      let storage = super::TaskStorage::new(self.stack_size);
      let handle = unsafe {
        xTaskCreateStatic(
          Some(task_function),
          name.as_ptr(),
          self.stack_size as _,
          entry.cast(),
          self.priority.to_freertos(),
          storage.stack_ptr(),
          storage.tcb_ptr(),
        )
      };
      (handle, storage)
    };

    if handle.is_null() {
      drop(unsafe { Box::from_raw(entry) });
      fatal("task creation failed")
    }

    log::trace!("created task {:?} ({:p}) with priority {}", name.as_str(), handle, self.priority);

    Task {
      handle,
      name,
      exited,
      deleted: false,
      #[cfg(feature = "static_allocation")]
      _storage: storage,
    }
  }
}
