use core::ffi::c_char;
use core::str;

use crate::shim::configMAX_TASK_NAME_LEN;

/// A task name, NUL-terminated and truncated to `configMAX_TASK_NAME_LEN` bytes
/// on a character boundary.
#[derive(Clone)]
pub(crate) struct TaskName {
  buf: [u8; configMAX_TASK_NAME_LEN],
  len: usize,
}

impl TaskName {
  pub fn new(name: &str) -> Self {
    let mut buf = [0; configMAX_TASK_NAME_LEN];

    let mut len = 0;
    for c in name.chars() {
      if c == '\0' || len + c.len_utf8() >= configMAX_TASK_NAME_LEN {
        break
      }

      len += c.encode_utf8(&mut buf[len..]).len();
    }

    Self { buf, len }
  }

  pub fn as_ptr(&self) -> *const c_char {
    self.buf.as_ptr().cast()
  }

  pub fn as_str(&self) -> &str {
    str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn short_names_are_kept() {
    assert_eq!(TaskName::new("idle").as_str(), "idle");
  }

  #[test]
  fn long_names_are_truncated_on_char_boundary() {
    let name = "ä".repeat(configMAX_TASK_NAME_LEN);
    let truncated = TaskName::new(&name);

    assert!(truncated.as_str().len() < configMAX_TASK_NAME_LEN);
    assert!(truncated.as_str().chars().all(|c| c == 'ä'));
    assert_eq!(truncated.buf[truncated.as_str().len()], 0);
  }
}
