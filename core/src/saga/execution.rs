// sagaflow/src/saga/execution.rs

//! Contains `Saga::execute()` and the reverse-order compensation procedure.

use crate::core::control::SagaState;
use crate::error::SagaError;
use crate::saga::definition::Saga;
use std::future::Future;
use std::time::Duration;
use tracing::{event, instrument, span, Instrument, Level};

impl<C, E> Saga<C, E>
where
  C: Send + 'static,
  E: std::error::Error + From<SagaError> + Send + Sync + 'static,
{
  /// Runs every step in insertion order against `ctx`.
  ///
  /// When a step fails, the steps that already succeeded are compensated in reverse
  /// order and the failing step's error is returned unchanged. A compensator that
  /// itself fails is recorded in [`Saga::compensation_failures`] and the remaining
  /// compensators still run.
  #[instrument(
    name = "Saga::execute",
    skip_all,
    fields(
      saga_context_type = %std::any::type_name::<C>(),
      saga_error_type = %std::any::type_name::<E>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn execute(&mut self, ctx: &mut C) -> Result<(), E> {
    self.executed_steps.clear();
    self.compensation_failures.clear();
    self.state = SagaState::Running;
    event!(Level::DEBUG, "Saga execution starting.");

    for step_idx in 0..self.steps.len() {
      let step = &self.steps[step_idx];
      let step_span = span!(
        Level::INFO,
        "saga_step_execution",
        step_name = step.name(),
        step_index = step_idx
      );
      event!(parent: &step_span, Level::DEBUG, "Executing step.");

      let outcome = match within_deadline(step.timeout(), step.execute(ctx))
        .instrument(step_span.clone())
        .await
      {
        Ok(result) => result,
        Err(limit) => {
          event!(
            parent: &step_span,
            Level::WARN,
            timeout = ?limit,
            "Step deadline elapsed, aborting its partial work."
          );
          let aborted = within_deadline(Some(limit), step.abort(ctx))
            .instrument(step_span.clone())
            .await;
          if let Err(message) = settle(step.name(), aborted) {
            event!(parent: &step_span, Level::WARN, error = %message, "Abort failed.");
            self.compensation_failures.push(SagaError::CompensationFailed {
              step_name: step.name().to_string(),
              message,
            });
          }
          Err(E::from(SagaError::StepTimedOut {
            step_name: step.name().to_string(),
            timeout: limit,
          }))
        }
      };

      match outcome {
        Ok(()) => {
          event!(Level::INFO, step_name = self.steps[step_idx].name(), "Step completed.");
          self.executed_steps.push(step_idx);
        }
        Err(e) => {
          event!(
            Level::ERROR,
            step_name = self.steps[step_idx].name(),
            error = %e,
            "Step failed, compensating executed steps."
          );
          self.state = SagaState::Compensating;
          self.compensate(ctx).await;
          self.state = SagaState::Failed;
          return Err(e);
        }
      }
    }

    self.state = SagaState::Succeeded;
    event!(Level::DEBUG, "Saga execution completed successfully.");
    Ok(())
  }

  /// Best-effort undo of every executed step, last one first.
  async fn compensate(&mut self, ctx: &mut C) {
    event!(
      Level::INFO,
      executed = self.executed_steps.len(),
      "Starting compensation."
    );

    for &step_idx in self.executed_steps.iter().rev() {
      let step = &self.steps[step_idx];
      let comp_span = span!(
        Level::INFO,
        "saga_step_compensation",
        step_name = step.name(),
        step_index = step_idx
      );

      let outcome = within_deadline(step.timeout(), step.compensate(ctx))
        .instrument(comp_span.clone())
        .await;

      match settle(step.name(), outcome) {
        Ok(()) => event!(parent: &comp_span, Level::INFO, "Step compensated."),
        Err(message) => {
          event!(
            parent: &comp_span,
            Level::WARN,
            error = %message,
            "Compensation failed, continuing with the remaining steps."
          );
          self.compensation_failures.push(SagaError::CompensationFailed {
            step_name: step.name().to_string(),
            message,
          });
        }
      }
    }

    event!(
      Level::INFO,
      failures = self.compensation_failures.len(),
      "Compensation finished."
    );
  }
}

/// Awaits `fut`, or returns the elapsed limit when it outlives `timeout`.
async fn within_deadline<F>(timeout: Option<Duration>, fut: F) -> Result<F::Output, Duration>
where
  F: Future,
{
  match timeout {
    None => Ok(fut.await),
    Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_elapsed| limit),
  }
}

/// Flattens a deadline-bounded cleanup call into the message recorded on failure.
fn settle<E: std::fmt::Display>(step_name: &str, outcome: Result<Result<(), E>, Duration>) -> Result<(), String> {
  match outcome {
    Ok(result) => result.map_err(|e| e.to_string()),
    Err(limit) => Err(
      SagaError::StepTimedOut {
        step_name: step_name.to_string(),
        timeout: limit,
      }
      .to_string(),
    ),
  }
}
