// sagaflow/src/workflow/steps/upload_batch.rs

use crate::core::step::Step;
use crate::services::{
  storage_key, BatchDestinationRequest, DestinationSpec, FileStorageService, ServiceError, UploadDestination,
  UploadMetadata,
};
use crate::workflow::context::{FileHandle, WorkflowContext};
use crate::workflow::error::WorkflowError;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{event, span, Instrument, Level};

/// Uploads the batch files one after another through presigned destinations.
///
/// Uploads are sequential: progress lines are reported in order and a failure leaves
/// a clean prefix of uploaded files behind, recorded in `output.uploaded_keys`. The
/// step removes that prefix itself when it fails or is aborted, because a step that
/// did not succeed is never compensated.
pub struct UploadBatchFilesStep {
  storage: Arc<dyn FileStorageService>,
  timeout: Option<Duration>,
  default_content_type: String,
}

impl UploadBatchFilesStep {
  pub const NAME: &'static str = "upload_batch_files";

  pub fn new(storage: Arc<dyn FileStorageService>, timeout: Option<Duration>, default_content_type: String) -> Self {
    Self {
      storage,
      timeout,
      default_content_type,
    }
  }

  fn content_type_of<'a>(&'a self, file: &'a FileHandle) -> &'a str {
    file.content_type.as_deref().unwrap_or(&self.default_content_type)
  }

  /// PUTs every file to its destination in order, recording each key as it lands.
  async fn upload_all(
    &self,
    ctx: &mut WorkflowContext,
    code: &str,
    files: &[FileHandle],
    destinations: &[UploadDestination],
  ) -> Result<(), WorkflowError> {
    let total = files.len();
    for (pos, destination) in destinations.iter().enumerate() {
      let attempt = pos + 1;
      // Indices were checked against `files` before the first PUT.
      let file = &files[destination.index - 1];
      let upload_span = span!(Level::DEBUG, "batch_file_upload", attempt, total, filename = %file.name);

      ctx.report(&format!("Uploading file {attempt} of {total}"));
      self
        .storage
        .put_to_destination(
          &destination.url,
          file,
          self.content_type_of(file),
          UploadMetadata { total, index: attempt },
        )
        .instrument(upload_span)
        .await
        .map_err(|source| WorkflowError::BatchUploadFailed {
          index: attempt,
          total,
          reason: format!("upload of '{}' failed", file.name),
          source: Some(source),
        })?;

      ctx
        .output
        .uploaded_keys
        .push(storage_key(code, destination.index, &destination.filename));
      event!(Level::DEBUG, attempt, total, "Batch file uploaded.");
    }
    Ok(())
  }

  /// Best-effort removal of every uploaded key. Failures are logged, never escalated.
  async fn remove_uploaded(&self, ctx: &WorkflowContext) {
    let keys = &ctx.output.uploaded_keys;
    if keys.is_empty() {
      return;
    }
    ctx.report("Removing uploaded files...");

    let mut removed = 0usize;
    for key in keys {
      match self.storage.delete_object(key).await {
        Ok(()) => removed += 1,
        Err(ServiceError::Unsupported(_)) => {
          event!(Level::WARN, key = %key, "Storage cannot delete; uploaded file cleanup required.")
        }
        Err(e) => event!(Level::WARN, key = %key, error = %e, "Failed to remove uploaded file."),
      }
    }
    event!(Level::INFO, removed, total = keys.len(), "Uploaded batch files removed.");
  }
}

/// Every file must get exactly one destination, addressed by its 1-based index.
fn check_destinations(destinations: &[UploadDestination], file_count: usize) -> Result<(), String> {
  if destinations.len() != file_count {
    return Err(format!(
      "expected {file_count} upload destinations, storage returned {}",
      destinations.len()
    ));
  }
  let mut seen = BTreeSet::new();
  for destination in destinations {
    if destination.index == 0 || destination.index > file_count {
      return Err(format!("destination refers to unknown file index {}", destination.index));
    }
    if !seen.insert(destination.index) {
      return Err(format!("duplicate destination for file index {}", destination.index));
    }
  }
  Ok(())
}

#[async_trait]
impl Step<WorkflowContext, WorkflowError> for UploadBatchFilesStep {
  fn name(&self) -> &str {
    Self::NAME
  }

  fn timeout(&self) -> Option<Duration> {
    self.timeout
  }

  async fn execute(&self, ctx: &mut WorkflowContext) -> Result<(), WorkflowError> {
    let files = ctx.input.batch_files.clone();
    if files.is_empty() {
      event!(Level::DEBUG, "No batch files, nothing to upload.");
      return Ok(());
    }
    let total = files.len();
    let code = ctx.output.record_code.clone().ok_or_else(|| WorkflowError::BatchUploadFailed {
      index: 0,
      total,
      reason: "record code is required".to_string(),
      source: None,
    })?;

    ctx.report("Requesting upload destinations...");
    let request = BatchDestinationRequest {
      code: code.clone(),
      total,
      files: files
        .iter()
        .enumerate()
        .map(|(i, f)| DestinationSpec {
          index: i + 1,
          content_type: self.content_type_of(f).to_string(),
          filename: f.name.clone(),
        })
        .collect(),
    };
    let destinations = self
      .storage
      .request_batch_destinations(&request)
      .await
      .map_err(|source| WorkflowError::BatchUploadFailed {
        index: 0,
        total,
        reason: "could not obtain upload destinations".to_string(),
        source: Some(source),
      })?;
    check_destinations(&destinations, total).map_err(|reason| WorkflowError::BatchUploadFailed {
      index: 0,
      total,
      reason,
      source: None,
    })?;

    if let Err(err) = self.upload_all(ctx, &code, &files, &destinations).await {
      event!(
        Level::WARN,
        uploaded = ctx.output.uploaded_keys.len(),
        "Batch upload failed, removing the files already uploaded."
      );
      self.remove_uploaded(ctx).await;
      return Err(err);
    }

    event!(Level::INFO, uploaded = total, "Batch upload complete.");
    Ok(())
  }

  async fn abort(&self, ctx: &mut WorkflowContext) -> Result<(), WorkflowError> {
    self.remove_uploaded(ctx).await;
    Ok(())
  }

  async fn compensate(&self, ctx: &mut WorkflowContext) -> Result<(), WorkflowError> {
    self.remove_uploaded(ctx).await;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn destination(index: usize) -> UploadDestination {
    UploadDestination {
      index,
      filename: format!("f{index}.png"),
      url: format!("memory://uploads/R1/{index}_f{index}.png"),
    }
  }

  #[test]
  fn destinations_must_cover_every_file_once() {
    assert!(check_destinations(&[destination(2), destination(1)], 2).is_ok());

    let short = check_destinations(&[destination(1)], 3).unwrap_err();
    assert!(short.contains("expected 3"), "{short}");

    let duplicate = check_destinations(&[destination(1), destination(1)], 2).unwrap_err();
    assert!(duplicate.contains("duplicate"), "{duplicate}");

    let out_of_range = check_destinations(&[destination(0), destination(2)], 2).unwrap_err();
    assert!(out_of_range.contains("unknown file index 0"), "{out_of_range}");
  }
}
