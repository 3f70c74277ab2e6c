// sagaflow/src/services/mod.rs

//! Contracts of the external systems the workflow steps talk to.
//!
//! The workflow only depends on these traits. `memory` provides in-process
//! implementations used by the tests and the demo binary.

pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::workflow::context::{FileHandle, ItemDescriptor};

pub use memory::{InMemoryChannelService, InMemoryFileStorage, InMemoryRecordService, OpenBehavior};

/// Failure reported by a collaborator.
#[derive(Debug, Error)]
pub enum ServiceError {
  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Request rejected with status {status}: {message}")]
  Status { status: u16, message: String },

  #[error("Request rejected: {0}")]
  Rejected(String),

  #[error("Operation not supported by this service: {0}")]
  Unsupported(&'static str),

  #[error("Transport failure: {0}")]
  Transport(#[source] anyhow::Error),
}

impl ServiceError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, ServiceError::NotFound(_))
  }
}

impl From<anyhow::Error> for ServiceError {
  fn from(err: anyhow::Error) -> Self {
    ServiceError::Transport(err)
  }
}

// --- Record service ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordRequest {
  pub name: String,
  pub date: NaiveDate,
  pub items: Vec<ItemDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRecord {
  pub id: i64,
  pub code: String,
}

#[async_trait]
pub trait RecordService: Send + Sync {
  async fn create(&self, request: &CreateRecordRequest) -> Result<CreatedRecord, ServiceError>;

  /// Deletes the record identified by `code`. Returns `ServiceError::NotFound`
  /// when no such record exists.
  async fn delete_by_code(&self, code: &str) -> Result<(), ServiceError>;
}

// --- Push channel service ---

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelHandle {
  pub id: u64,
  pub code: String,
}

/// Signal delivered once a channel has either opened or errored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSignal {
  Opened,
  Error(String),
}

/// A channel whose handshake is in flight.
///
/// The handle is usable (and closable) immediately; `signal` resolves when the
/// server confirms or rejects the connection. A sender dropped without a signal
/// counts as an error.
#[derive(Debug)]
pub struct ChannelOpening {
  pub handle: ChannelHandle,
  pub signal: oneshot::Receiver<ChannelSignal>,
}

#[async_trait]
pub trait PushChannelService: Send + Sync {
  async fn open(&self, code: &str) -> Result<ChannelOpening, ServiceError>;

  /// Closes `handle`. Closing a channel that is already closed is a no-op.
  async fn close(&self, handle: &ChannelHandle) -> Result<(), ServiceError>;
}

// --- File storage service ---

/// Key under which a batch file lands in storage. Compensation deletes exactly these keys.
pub fn storage_key(code: &str, index: usize, filename: &str) -> String {
  format!("uploads/{code}/{index}_{filename}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
  pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationSpec {
  /// 1-based position of the file in the batch.
  pub index: usize,
  pub content_type: String,
  pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDestinationRequest {
  pub code: String,
  pub total: usize,
  pub files: Vec<DestinationSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDestination {
  pub index: usize,
  pub filename: String,
  pub url: String,
}

/// Metadata attached to each presigned PUT so the receiving pipeline can tell
/// when a batch is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMetadata {
  pub total: usize,
  pub index: usize,
}

#[async_trait]
pub trait FileStorageService: Send + Sync {
  async fn upload_direct(&self, file: &FileHandle, code: &str) -> Result<StoredFile, ServiceError>;

  async fn request_batch_destinations(
    &self,
    request: &BatchDestinationRequest,
  ) -> Result<Vec<UploadDestination>, ServiceError>;

  async fn put_to_destination(
    &self,
    url: &str,
    file: &FileHandle,
    content_type: &str,
    metadata: UploadMetadata,
  ) -> Result<(), ServiceError>;

  /// Removes a stored object by key or reference.
  ///
  /// Storages that cannot delete keep this default, and compensation logs the
  /// leftover objects instead.
  async fn delete_object(&self, key: &str) -> Result<(), ServiceError> {
    let _ = key;
    Err(ServiceError::Unsupported("delete_object"))
  }
}

#[cfg(test)]
mod tests {
  use super::storage_key;

  #[test]
  fn storage_key_combines_code_index_and_filename() {
    assert_eq!(storage_key("R00001", 3, "page.png"), "uploads/R00001/3_page.png");
  }
}
