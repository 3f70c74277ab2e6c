// sagaflow/src/workflow/error.rs
use crate::error::SagaError;
use crate::services::ServiceError;
use std::time::Duration;
use thiserror::Error;

/// Terminal error of a record-intake run, plus the compensation error kind that the
/// orchestrator records but never returns.
#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("Invalid input: {0}")]
  InvalidInput(String),

  #[error("Record creation failed. Source: {source}")]
  RecordCreationFailed {
    #[source]
    source: ServiceError,
  },

  #[error("Channel open failed: {reason}")]
  ChannelOpenFailed { reason: String },

  #[error("Primary file upload failed: {reason}")]
  PrimaryUploadFailed {
    reason: String,
    #[source]
    source: Option<ServiceError>,
  },

  /// `index` is the 1-based position of the failing file, or 0 when the failure
  /// happened before any file was attempted.
  #[error("Batch upload failed at file {index} of {total}: {reason}")]
  BatchUploadFailed {
    index: usize,
    total: usize,
    reason: String,
    #[source]
    source: Option<ServiceError>,
  },

  #[error("Compensation of step '{step_name}' failed. Source: {source}")]
  CompensationFailed {
    step_name: String,
    #[source]
    source: ServiceError,
  },

  #[error("Step '{step_name}' timed out after {timeout:?}")]
  StepTimedOut { step_name: String, timeout: Duration },

  #[error("Saga error: {0}")]
  Saga(#[source] SagaError),
}

impl From<SagaError> for WorkflowError {
  fn from(err: SagaError) -> Self {
    match err {
      SagaError::StepTimedOut { step_name, timeout } => WorkflowError::StepTimedOut { step_name, timeout },
      other => WorkflowError::Saga(other),
    }
  }
}

pub type WorkflowResult<T, E = WorkflowError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;
  use std::error::Error as _;

  #[test]
  fn saga_errors_keep_their_source() {
    let err = WorkflowError::from(SagaError::CompensationFailed {
      step_name: "open_channel".to_string(),
      message: "close refused".to_string(),
    });
    let source = err.source().expect("saga error is the source");
    assert!(source.to_string().contains("open_channel"));
  }

  #[test]
  fn saga_timeouts_map_to_step_timed_out() {
    let err = WorkflowError::from(SagaError::StepTimedOut {
      step_name: "create_record".to_string(),
      timeout: Duration::from_secs(5),
    });
    assert!(matches!(err, WorkflowError::StepTimedOut { ref step_name, .. } if step_name == "create_record"));
  }
}
