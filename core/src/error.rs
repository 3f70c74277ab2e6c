// sagaflow/src/error.rs
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the orchestrator itself rather than by a step.
///
/// A `Saga<C, E>` converts these into the application's `E` through `From<SagaError>`,
/// the same way every step error is surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SagaError {
  #[error("Step '{step_name}' did not finish within {timeout:?}")]
  StepTimedOut { step_name: String, timeout: Duration },

  /// Diagnostic only. Recorded by the orchestrator while compensating and never
  /// returned as the outcome of a run.
  #[error("Compensation failed for step '{step_name}': {message}")]
  CompensationFailed { step_name: String, message: String },
}

impl SagaError {
  /// Name of the step this error is attributed to.
  pub fn step_name(&self) -> &str {
    match self {
      SagaError::StepTimedOut { step_name, .. } => step_name,
      SagaError::CompensationFailed { step_name, .. } => step_name,
    }
  }
}

pub type SagaResult<T, E = SagaError> = std::result::Result<T, E>;
