// sagaflow/src/workflow/factory.rs

//! Assembles the record-intake saga from its collaborators and configuration.

use crate::saga::Saga;
use crate::services::{FileStorageService, PushChannelService, RecordService};
use crate::workflow::config::WorkflowConfig;
use crate::workflow::context::WorkflowContext;
use crate::workflow::error::WorkflowError;
use crate::workflow::steps::{CreateRecordStep, OpenChannelStep, UploadBatchFilesStep, UploadPrimaryFileStep};
use std::sync::Arc;

/// The collaborators the workflow's steps call into.
///
/// Primary and batch files may live in different storages; [`WorkflowServices::new`]
/// uses one storage for both.
#[derive(Clone)]
pub struct WorkflowServices {
  pub records: Arc<dyn RecordService>,
  pub channels: Arc<dyn PushChannelService>,
  pub primary_storage: Arc<dyn FileStorageService>,
  pub batch_storage: Arc<dyn FileStorageService>,
}

impl WorkflowServices {
  pub fn new(
    records: Arc<dyn RecordService>,
    channels: Arc<dyn PushChannelService>,
    storage: Arc<dyn FileStorageService>,
  ) -> Self {
    Self {
      records,
      channels,
      primary_storage: storage.clone(),
      batch_storage: storage,
    }
  }

  pub fn with_batch_storage(mut self, storage: Arc<dyn FileStorageService>) -> Self {
    self.batch_storage = storage;
    self
  }
}

/// Builds a fresh saga running create-record, open-channel, upload-primary-file and
/// upload-batch-files, in that order.
///
/// The channel is opened before any upload so that progress events emitted by the
/// storage pipeline reach the caller.
pub fn build_workflow(services: WorkflowServices, config: &WorkflowConfig) -> Saga<WorkflowContext, WorkflowError> {
  Saga::new()
    .add_step(CreateRecordStep::new(services.records, config.record_timeout))
    .add_step(OpenChannelStep::new(services.channels, config.channel_open_timeout))
    .add_step(UploadPrimaryFileStep::new(services.primary_storage, config.upload_timeout))
    .add_step(UploadBatchFilesStep::new(
      services.batch_storage,
      config.upload_timeout,
      config.default_batch_content_type.clone(),
    ))
}
