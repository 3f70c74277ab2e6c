// sagaflow/src/core/control.rs

//! Lifecycle of a single saga run.

/// Where a saga run currently stands.
///
/// ```text
/// NotStarted -> Running -> Succeeded
///                       \-> Compensating -> Failed
/// ```
///
/// There is no path from `Compensating` back to `Running`; a failed run has to be
/// started again from scratch with a fresh context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SagaState {
  #[default]
  NotStarted,
  Running,
  /// Every step executed successfully and no compensation ran.
  Succeeded,
  /// A step failed; compensators of the already-executed steps are running in reverse.
  Compensating,
  /// Compensation finished (best-effort) and the original failure was returned.
  Failed,
}

impl SagaState {
  /// True once the run has reached `Succeeded` or `Failed`.
  pub fn is_terminal(self) -> bool {
    matches!(self, SagaState::Succeeded | SagaState::Failed)
  }
}
