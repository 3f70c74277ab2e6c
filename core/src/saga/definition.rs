// sagaflow/src/saga/definition.rs

//! Contains the `Saga<C, E>` struct definition and its builder-style construction.

use crate::core::control::SagaState;
use crate::core::step::{BoxedStep, Step};
use crate::error::SagaError;

/// An ordered list of steps executed sequentially against a context `C`, with
/// reverse-order compensation when one of them fails.
///
/// `E` is the error type the steps return. It must be `From<SagaError>` so that
/// orchestrator-level failures (step deadlines) reach the caller as the same type.
///
/// A `Saga` keeps per-run bookkeeping and `execute` takes `&mut self`, so one
/// instance cannot host two overlapping runs.
pub struct Saga<C, E>
where
  C: Send + 'static,
  E: std::error::Error + From<SagaError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<BoxedStep<C, E>>,

  /// Indices into `steps` of the steps whose `execute` returned `Ok` in the current run.
  pub(crate) executed_steps: Vec<usize>,

  pub(crate) state: SagaState,
  pub(crate) compensation_failures: Vec<SagaError>,
}

impl<C, E> Saga<C, E>
where
  C: Send + 'static,
  E: std::error::Error + From<SagaError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      steps: Vec::new(),
      executed_steps: Vec::new(),
      state: SagaState::NotStarted,
      compensation_failures: Vec::new(),
    }
  }

  /// Appends a step. Steps run in insertion order.
  pub fn add_step<S>(self, step: S) -> Self
  where
    S: Step<C, E> + 'static,
  {
    self.add_boxed_step(Box::new(step))
  }

  pub fn add_boxed_step(mut self, step: BoxedStep<C, E>) -> Self {
    self.steps.push(step);
    self
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  /// Step names in execution order.
  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name()).collect()
  }

  /// State of the most recent run, or `NotStarted` if `execute` was never called.
  pub fn state(&self) -> SagaState {
    self.state
  }

  /// `SagaError::CompensationFailed` entries recorded during the most recent run.
  ///
  /// Purely diagnostic: the run's own result is always the failure that triggered
  /// compensation.
  pub fn compensation_failures(&self) -> &[SagaError] {
    &self.compensation_failures
  }
}

impl<C, E> Default for Saga<C, E>
where
  C: Send + 'static,
  E: std::error::Error + From<SagaError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<C, E> std::fmt::Debug for Saga<C, E>
where
  C: Send + 'static,
  E: std::error::Error + From<SagaError> + Send + Sync + 'static,
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Saga")
      .field("steps", &self.step_names())
      .field("state", &self.state)
      .field("compensation_failures", &self.compensation_failures.len())
      .finish()
  }
}
