use crate::shim::{
  eTaskState,
  eTaskState_eBlocked,
  eTaskState_eReady,
  eTaskState_eRunning,
  eTaskState_eSuspended,
};

/// Status of a [`Task`](crate::task::Task).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TaskState {
  /// The task is querying the state of itself, so must be running.
  Running,
  /// The task is in a ready or pending ready list.
  Ready,
  /// The task is blocked.
  Blocked,
  /// The task is suspended or blocked with an infinite time out.
  Suspended,
  /// The task has been deleted or has terminated. This state is final.
  Deleted,
}

impl TaskState {
  pub(crate) fn from_freertos(state: eTaskState) -> Self {
    match state {
      eTaskState_eRunning => Self::Running,
      eTaskState_eReady => Self::Ready,
      eTaskState_eBlocked => Self::Blocked,
      eTaskState_eSuspended => Self::Suspended,
      _ => Self::Deleted,
    }
  }
}
