// sagaflow/src/core/step.rs

//! Defines the `Step<C, E>` trait: one unit of work paired with its compensation.

use async_trait::async_trait;
use std::time::Duration;

/// A named unit of work inside a saga.
///
/// `execute` performs the side effect and may write its outputs into the context.
/// `compensate` undoes it on a best-effort basis. The orchestrator only ever calls
/// `compensate` for a step whose `execute` returned `Ok` during the same run, but
/// implementations must still treat "nothing to undo" as a successful no-op, since
/// `execute` may have returned early without touching anything.
///
/// Both methods receive the context by exclusive reference: one run owns its context
/// for its whole duration and steps never observe it concurrently.
#[async_trait]
pub trait Step<C, E>: Send + Sync
where
  C: Send + 'static,
  E: std::error::Error + Send + Sync + 'static,
{
  /// Identifier used in logs and diagnostics.
  fn name(&self) -> &str;

  async fn execute(&self, ctx: &mut C) -> Result<(), E>;

  async fn compensate(&self, ctx: &mut C) -> Result<(), E>;

  /// Cleans up after an `execute` that was cut off by its deadline.
  ///
  /// The interrupted step is never compensated, so a step that writes several
  /// side effects before finishing should release them here. Runs under the same
  /// deadline as `execute`; a failure is recorded like a compensation failure.
  async fn abort(&self, _ctx: &mut C) -> Result<(), E> {
    Ok(())
  }

  /// Optional deadline the orchestrator applies to `execute`, `abort` and `compensate`.
  ///
  /// `None` (the default) lets the step run for as long as its collaborators take.
  fn timeout(&self) -> Option<Duration> {
    None
  }
}

/// A boxed, type-erased step as stored by the orchestrator.
pub type BoxedStep<C, E> = Box<dyn Step<C, E>>;

impl<C, E> std::fmt::Debug for dyn Step<C, E>
where
  C: Send + 'static,
  E: std::error::Error + Send + Sync + 'static,
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Step")
      .field("name", &self.name())
      .field("timeout", &self.timeout())
      .finish()
  }
}
