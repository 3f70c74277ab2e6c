// sagaflow/src/services/memory.rs

//! In-process collaborators. They keep their state behind `parking_lot` mutexes,
//! support scripted failures, and log every call so a test can inspect what the
//! workflow and its compensations actually did.

use super::{
  storage_key, BatchDestinationRequest, ChannelHandle, ChannelOpening, ChannelSignal, CreateRecordRequest, CreatedRecord,
  FileStorageService, PushChannelService, RecordService, ServiceError, StoredFile, UploadDestination, UploadMetadata,
};
use crate::workflow::context::FileHandle;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info};

// --- Records ---

#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
  pub id: i64,
  pub code: String,
  pub request: CreateRecordRequest,
}

#[derive(Debug, Default)]
struct RecordState {
  next_id: i64,
  records: HashMap<String, StoredRecord>,
  fail_create: Option<String>,
  fail_delete: Option<String>,
  create_delay: Option<Duration>,
  delete_calls: Vec<String>,
}

/// Allocates ids sequentially and codes of the form `R00001`.
#[derive(Debug, Default)]
pub struct InMemoryRecordService {
  state: Mutex<RecordState>,
}

impl InMemoryRecordService {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Every subsequent `create` fails with a 500 status carrying `message`.
  pub fn fail_create_with(&self, message: impl Into<String>) {
    self.state.lock().fail_create = Some(message.into());
  }

  /// Every subsequent `delete_by_code` fails with a 500 status carrying `message`.
  pub fn fail_delete_with(&self, message: impl Into<String>) {
    self.state.lock().fail_delete = Some(message.into());
  }

  /// Makes `create` sleep before answering, to exercise step deadlines.
  pub fn set_create_delay(&self, delay: Duration) {
    self.state.lock().create_delay = Some(delay);
  }

  /// Drops a record behind the workflow's back, as a concurrent admin would.
  pub fn remove_silently(&self, code: &str) {
    self.state.lock().records.remove(code);
  }

  pub fn contains(&self, code: &str) -> bool {
    self.state.lock().records.contains_key(code)
  }

  pub fn records(&self) -> Vec<StoredRecord> {
    let mut records: Vec<_> = self.state.lock().records.values().cloned().collect();
    records.sort_by_key(|r| r.id);
    records
  }

  /// Codes passed to `delete_by_code`, in call order, including failed calls.
  pub fn delete_calls(&self) -> Vec<String> {
    self.state.lock().delete_calls.clone()
  }
}

#[async_trait]
impl RecordService for InMemoryRecordService {
  async fn create(&self, request: &CreateRecordRequest) -> Result<CreatedRecord, ServiceError> {
    let delay = self.state.lock().create_delay;
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }

    let mut state = self.state.lock();
    if let Some(message) = &state.fail_create {
      return Err(ServiceError::Status {
        status: 500,
        message: message.clone(),
      });
    }
    state.next_id += 1;
    let id = state.next_id;
    let code = format!("R{id:05}");
    state.records.insert(
      code.clone(),
      StoredRecord {
        id,
        code: code.clone(),
        request: request.clone(),
      },
    );
    info!(record_id = id, record_code = %code, "In-memory record created.");
    Ok(CreatedRecord { id, code })
  }

  async fn delete_by_code(&self, code: &str) -> Result<(), ServiceError> {
    let mut state = self.state.lock();
    state.delete_calls.push(code.to_string());
    if let Some(message) = &state.fail_delete {
      return Err(ServiceError::Status {
        status: 500,
        message: message.clone(),
      });
    }
    match state.records.remove(code) {
      Some(_) => Ok(()),
      None => Err(ServiceError::NotFound(format!("record '{code}'"))),
    }
  }
}

// --- Push channels ---

/// How the in-memory channel service answers `open`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OpenBehavior {
  /// The handshake is confirmed immediately.
  #[default]
  Confirm,
  /// The handshake is answered with an error signal.
  Reject(String),
  /// The handshake never completes, so callers hit their own timeout.
  Silent,
  /// `open` itself fails before a handle exists.
  Refuse(String),
}

#[derive(Debug, Default)]
struct ChannelState {
  next_id: u64,
  behavior: OpenBehavior,
  open: BTreeMap<u64, ChannelHandle>,
  // Senders of silent handshakes are parked here so the receiver never sees a drop.
  pending: Vec<oneshot::Sender<ChannelSignal>>,
  opened: Vec<ChannelHandle>,
  close_calls: Vec<ChannelHandle>,
  fail_close: Option<String>,
}

#[derive(Debug, Default)]
pub struct InMemoryChannelService {
  state: Mutex<ChannelState>,
}

impl InMemoryChannelService {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn with_behavior(behavior: OpenBehavior) -> Arc<Self> {
    let service = Self::default();
    service.state.lock().behavior = behavior;
    Arc::new(service)
  }

  pub fn set_behavior(&self, behavior: OpenBehavior) {
    self.state.lock().behavior = behavior;
  }

  pub fn fail_close_with(&self, message: impl Into<String>) {
    self.state.lock().fail_close = Some(message.into());
  }

  /// Every handle ever returned by `open`.
  pub fn opened(&self) -> Vec<ChannelHandle> {
    self.state.lock().opened.clone()
  }

  /// Handles that were opened and not yet closed.
  pub fn open_channels(&self) -> Vec<ChannelHandle> {
    self.state.lock().open.values().cloned().collect()
  }

  /// Handles passed to `close`, in call order.
  pub fn close_calls(&self) -> Vec<ChannelHandle> {
    self.state.lock().close_calls.clone()
  }
}

#[async_trait]
impl PushChannelService for InMemoryChannelService {
  async fn open(&self, code: &str) -> Result<ChannelOpening, ServiceError> {
    let mut state = self.state.lock();
    let signal = match state.behavior.clone() {
      OpenBehavior::Refuse(message) => return Err(ServiceError::Rejected(message)),
      OpenBehavior::Confirm => Some(ChannelSignal::Opened),
      OpenBehavior::Reject(message) => Some(ChannelSignal::Error(message)),
      OpenBehavior::Silent => None,
    };

    state.next_id += 1;
    let handle = ChannelHandle {
      id: state.next_id,
      code: code.to_string(),
    };
    let (tx, rx) = oneshot::channel();
    match signal {
      Some(signal) => {
        let _ = tx.send(signal);
      }
      None => state.pending.push(tx),
    }
    state.open.insert(handle.id, handle.clone());
    state.opened.push(handle.clone());
    debug!(channel_id = handle.id, record_code = %code, "In-memory channel opening.");

    Ok(ChannelOpening { handle, signal: rx })
  }

  async fn close(&self, handle: &ChannelHandle) -> Result<(), ServiceError> {
    let mut state = self.state.lock();
    state.close_calls.push(handle.clone());
    if let Some(message) = &state.fail_close {
      return Err(ServiceError::Status {
        status: 500,
        message: message.clone(),
      });
    }
    // Closing twice is a no-op.
    state.open.remove(&handle.id);
    Ok(())
  }
}

// --- File storage ---

const URL_SCHEME: &str = "memory://";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
  pub content_type: String,
  pub bytes: Arc<[u8]>,
  pub metadata: Option<UploadMetadata>,
}

#[derive(Debug)]
struct StorageState {
  objects: BTreeMap<String, StoredObject>,
  batch_requests: Vec<BatchDestinationRequest>,
  put_attempts: Vec<UploadMetadata>,
  deleted: Vec<String>,
  delete_attempts: Vec<String>,
  fail_direct: Option<String>,
  fail_destinations: Option<String>,
  fail_put_at: Option<usize>,
  stall_put_at: Option<(usize, Duration)>,
  deletion_supported: bool,
}

impl Default for StorageState {
  fn default() -> Self {
    Self {
      objects: BTreeMap::new(),
      batch_requests: Vec::new(),
      put_attempts: Vec::new(),
      deleted: Vec::new(),
      delete_attempts: Vec::new(),
      fail_direct: None,
      fail_destinations: None,
      fail_put_at: None,
      stall_put_at: None,
      deletion_supported: true,
    }
  }
}

/// Object store addressed by keys; presigned URLs are `memory://<key>?signature=...`.
#[derive(Debug, Default)]
pub struct InMemoryFileStorage {
  state: Mutex<StorageState>,
}

impl InMemoryFileStorage {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// A storage whose `delete_object` reports `Unsupported`, like a bucket the
  /// client may write to but never delete from.
  pub fn without_deletion() -> Arc<Self> {
    let storage = Self::default();
    storage.state.lock().deletion_supported = false;
    Arc::new(storage)
  }

  pub fn fail_direct_upload_with(&self, message: impl Into<String>) {
    self.state.lock().fail_direct = Some(message.into());
  }

  pub fn fail_destinations_with(&self, message: impl Into<String>) {
    self.state.lock().fail_destinations = Some(message.into());
  }

  /// Fails the presigned PUT carrying metadata index `index` (1-based).
  pub fn fail_put_at(&self, index: usize) {
    self.state.lock().fail_put_at = Some(index);
  }

  /// Makes the PUT carrying metadata index `index` sleep for `delay` before storing.
  pub fn stall_put_at(&self, index: usize, delay: Duration) {
    self.state.lock().stall_put_at = Some((index, delay));
  }

  pub fn object_keys(&self) -> Vec<String> {
    self.state.lock().objects.keys().cloned().collect()
  }

  pub fn object(&self, key: &str) -> Option<StoredObject> {
    self.state.lock().objects.get(key).cloned()
  }

  pub fn batch_requests(&self) -> Vec<BatchDestinationRequest> {
    self.state.lock().batch_requests.clone()
  }

  /// Metadata of every PUT attempted, successful or not.
  pub fn put_attempts(&self) -> Vec<UploadMetadata> {
    self.state.lock().put_attempts.clone()
  }

  /// Keys passed to a supported `delete_object`, in call order.
  pub fn deleted_keys(&self) -> Vec<String> {
    self.state.lock().deleted.clone()
  }

  /// Every key passed to `delete_object`, whether or not deletion is supported.
  pub fn delete_attempts(&self) -> Vec<String> {
    self.state.lock().delete_attempts.clone()
  }
}

fn key_of(url_or_key: &str) -> &str {
  let key = url_or_key.strip_prefix(URL_SCHEME).unwrap_or(url_or_key);
  key.split_once('?').map_or(key, |(k, _)| k)
}

#[async_trait]
impl FileStorageService for InMemoryFileStorage {
  async fn upload_direct(&self, file: &FileHandle, code: &str) -> Result<StoredFile, ServiceError> {
    let mut state = self.state.lock();
    if let Some(message) = &state.fail_direct {
      return Err(ServiceError::Status {
        status: 502,
        message: message.clone(),
      });
    }
    let key = format!("primary/{code}/{}", file.name);
    state.objects.insert(
      key.clone(),
      StoredObject {
        content_type: file
          .content_type
          .clone()
          .unwrap_or_else(|| "application/octet-stream".to_string()),
        bytes: file.bytes.clone(),
        metadata: None,
      },
    );
    Ok(StoredFile {
      url: format!("{URL_SCHEME}{key}"),
    })
  }

  async fn request_batch_destinations(
    &self,
    request: &BatchDestinationRequest,
  ) -> Result<Vec<UploadDestination>, ServiceError> {
    let mut state = self.state.lock();
    state.batch_requests.push(request.clone());
    if let Some(message) = &state.fail_destinations {
      return Err(ServiceError::Status {
        status: 500,
        message: message.clone(),
      });
    }
    Ok(
      request
        .files
        .iter()
        .map(|spec| UploadDestination {
          index: spec.index,
          filename: spec.filename.clone(),
          url: format!(
            "{URL_SCHEME}{}?signature=presigned",
            storage_key(&request.code, spec.index, &spec.filename)
          ),
        })
        .collect(),
    )
  }

  async fn put_to_destination(
    &self,
    url: &str,
    file: &FileHandle,
    content_type: &str,
    metadata: UploadMetadata,
  ) -> Result<(), ServiceError> {
    let stall = {
      let mut state = self.state.lock();
      state.put_attempts.push(metadata);
      state
        .stall_put_at
        .and_then(|(index, delay)| (index == metadata.index).then_some(delay))
    };
    if let Some(delay) = stall {
      tokio::time::sleep(delay).await;
    }

    let mut state = self.state.lock();
    if state.fail_put_at == Some(metadata.index) {
      return Err(ServiceError::Status {
        status: 503,
        message: format!("PUT {} rejected", file.name),
      });
    }
    state.objects.insert(
      key_of(url).to_string(),
      StoredObject {
        content_type: content_type.to_string(),
        bytes: file.bytes.clone(),
        metadata: Some(metadata),
      },
    );
    Ok(())
  }

  async fn delete_object(&self, key: &str) -> Result<(), ServiceError> {
    let mut state = self.state.lock();
    let key = key_of(key).to_string();
    state.delete_attempts.push(key.clone());
    if !state.deletion_supported {
      return Err(ServiceError::Unsupported("delete_object"));
    }
    state.deleted.push(key.clone());
    match state.objects.remove(&key) {
      Some(_) => Ok(()),
      None => Err(ServiceError::NotFound(format!("object '{key}'"))),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn key_of_strips_scheme_and_query() {
    assert_eq!(key_of("memory://uploads/R1/1_a.png?signature=presigned"), "uploads/R1/1_a.png");
    assert_eq!(key_of("uploads/R1/1_a.png"), "uploads/R1/1_a.png");
  }

  #[tokio::test]
  async fn closing_a_channel_twice_is_a_no_op() {
    let channels = InMemoryChannelService::new();
    let opening = channels.open("R00001").await.unwrap();
    channels.close(&opening.handle).await.unwrap();
    channels.close(&opening.handle).await.unwrap();
    assert!(channels.open_channels().is_empty());
    assert_eq!(channels.close_calls().len(), 2);
  }

  #[tokio::test]
  async fn deleting_a_missing_record_reports_not_found() {
    let records = InMemoryRecordService::new();
    let err = records.delete_by_code("R99999").await.unwrap_err();
    assert!(err.is_not_found());
  }
}
