// sagaflow/src/workflow/steps/upload_primary.rs

use crate::core::step::Step;
use crate::services::{FileStorageService, ServiceError};
use crate::workflow::context::WorkflowContext;
use crate::workflow::error::WorkflowError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{event, Level};

/// Uploads the optional primary file directly to storage.
pub struct UploadPrimaryFileStep {
  storage: Arc<dyn FileStorageService>,
  timeout: Option<Duration>,
}

impl UploadPrimaryFileStep {
  pub const NAME: &'static str = "upload_primary_file";

  pub fn new(storage: Arc<dyn FileStorageService>, timeout: Option<Duration>) -> Self {
    Self { storage, timeout }
  }
}

#[async_trait]
impl Step<WorkflowContext, WorkflowError> for UploadPrimaryFileStep {
  fn name(&self) -> &str {
    Self::NAME
  }

  fn timeout(&self) -> Option<Duration> {
    self.timeout
  }

  async fn execute(&self, ctx: &mut WorkflowContext) -> Result<(), WorkflowError> {
    let Some(file) = ctx.input.primary_file.clone() else {
      event!(Level::DEBUG, "No primary file, nothing to upload.");
      return Ok(());
    };
    let code = ctx.output.record_code.clone().ok_or_else(|| WorkflowError::PrimaryUploadFailed {
      reason: "record code is required".to_string(),
      source: None,
    })?;

    ctx.report("Uploading primary file...");
    let stored = self
      .storage
      .upload_direct(&file, &code)
      .await
      .map_err(|source| WorkflowError::PrimaryUploadFailed {
        reason: format!("upload of '{}' failed", file.name),
        source: Some(source),
      })?;

    event!(Level::INFO, url = %stored.url, "Primary file stored.");
    ctx.output.primary_file_refs.push(stored.url);
    Ok(())
  }

  /// Best-effort: every failure is logged and the step still reports success.
  async fn compensate(&self, ctx: &mut WorkflowContext) -> Result<(), WorkflowError> {
    for reference in &ctx.output.primary_file_refs {
      match self.storage.delete_object(reference).await {
        Ok(()) => event!(Level::INFO, reference = %reference, "Primary file removed."),
        Err(ServiceError::Unsupported(_)) => {
          event!(Level::WARN, reference = %reference, "Storage cannot delete; primary file cleanup required.")
        }
        Err(e) => event!(Level::WARN, reference = %reference, error = %e, "Failed to remove primary file."),
      }
    }
    Ok(())
  }
}
