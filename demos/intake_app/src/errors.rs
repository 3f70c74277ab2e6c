// demos/intake_app/src/errors.rs

use sagaflow::WorkflowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from] // Allows conversion from sagaflow::WorkflowError
    source: WorkflowError,
  },

  #[error("Internal Error: {0}")]
  Internal(String),
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    AppError::Internal(err.to_string())
  }
}

// Define a Result type alias for the application
pub type Result<T, E = AppError> = std::result::Result<T, E>;
