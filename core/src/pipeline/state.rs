// squadpipe/src/pipeline/state.rs

/// Lifecycle of a pipeline run.
///
/// `Unwired → Wired → Running → (Draining | Killing) → Stopped`.
/// `Draining` is reached once the head squad has finished or on an explicit
/// shutdown; `Killing` on a fatal worker error or an explicit kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
  Unwired,
  Wired,
  Running,
  Draining,
  Killing,
  Stopped,
}

impl PipelineState {
  /// True once worker tasks have been submitted.
  pub fn is_started(self) -> bool {
    matches!(
      self,
      PipelineState::Running | PipelineState::Draining | PipelineState::Killing | PipelineState::Stopped
    )
  }

  pub fn is_stopped(self) -> bool {
    self == PipelineState::Stopped
  }

  pub(crate) fn can_move_to(self, next: PipelineState) -> bool {
    use PipelineState::*;
    matches!(
      (self, next),
      (Unwired, Wired)
        | (Wired, Running)
        | (Running, Draining)
        | (Running, Killing)
        | (Draining, Killing)
        | (Running, Stopped)
        | (Draining, Stopped)
        | (Killing, Stopped)
    )
  }
}
