// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use sagaflow::services::{InMemoryChannelService, InMemoryFileStorage, InMemoryRecordService};
use sagaflow::{
  ContextBuilder, FileHandle, ItemDescriptor, SagaError, Step, WorkflowConfig, WorkflowContext, WorkflowServices,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

// --- Generic saga test context ---
#[derive(Clone, Debug, Default)]
pub struct TestContext {
  /// Entries like "execute:a", "abort:a" or "compensate:a", in call order.
  pub calls: Vec<String>,
  pub counter: i32,
}

impl TestContext {
  pub fn executed(&self) -> Vec<&str> {
    self.calls.iter().filter_map(|c| c.strip_prefix("execute:")).collect()
  }

  pub fn compensated(&self) -> Vec<&str> {
    self.calls.iter().filter_map(|c| c.strip_prefix("compensate:")).collect()
  }

  pub fn aborted(&self) -> Vec<&str> {
    self.calls.iter().filter_map(|c| c.strip_prefix("abort:")).collect()
  }
}

// --- Common Error Type for Tests ---
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("Saga framework error: {0}")]
  Saga(SagaError),

  #[error("Test step failed: {0}")]
  Step(String),

  #[error("Test compensation failed: {0}")]
  Compensation(String),
}

impl From<SagaError> for TestError {
  fn from(err: SagaError) -> Self {
    TestError::Saga(err)
  }
}

/// A step that records its calls into `TestContext::calls`, with scriptable failures.
#[derive(Debug, Clone, Default)]
pub struct RecordingStep {
  pub name: String,
  pub fail_execute: bool,
  pub fail_compensate: bool,
  pub fail_abort: bool,
  pub execute_delay: Option<Duration>,
  pub timeout: Option<Duration>,
}

impl RecordingStep {
  pub fn ok(name: &str) -> Self {
    Self {
      name: name.to_string(),
      ..Default::default()
    }
  }

  pub fn failing(name: &str) -> Self {
    Self {
      name: name.to_string(),
      fail_execute: true,
      ..Default::default()
    }
  }

  pub fn with_failing_compensation(mut self) -> Self {
    self.fail_compensate = true;
    self
  }

  pub fn with_failing_abort(mut self) -> Self {
    self.fail_abort = true;
    self
  }

  pub fn slow(mut self, delay: Duration, timeout: Duration) -> Self {
    self.execute_delay = Some(delay);
    self.timeout = Some(timeout);
    self
  }
}

#[async_trait]
impl Step<TestContext, TestError> for RecordingStep {
  fn name(&self) -> &str {
    &self.name
  }

  fn timeout(&self) -> Option<Duration> {
    self.timeout
  }

  async fn execute(&self, ctx: &mut TestContext) -> Result<(), TestError> {
    ctx.calls.push(format!("execute:{}", self.name));
    if let Some(delay) = self.execute_delay {
      tokio::time::sleep(delay).await;
    }
    if self.fail_execute {
      tracing::warn!(target: "test_steps", step = %self.name, "failing on purpose");
      return Err(TestError::Step(self.name.clone()));
    }
    ctx.counter += 1;
    Ok(())
  }

  async fn abort(&self, ctx: &mut TestContext) -> Result<(), TestError> {
    ctx.calls.push(format!("abort:{}", self.name));
    if self.fail_abort {
      return Err(TestError::Compensation(self.name.clone()));
    }
    Ok(())
  }

  async fn compensate(&self, ctx: &mut TestContext) -> Result<(), TestError> {
    ctx.calls.push(format!("compensate:{}", self.name));
    if self.fail_compensate {
      return Err(TestError::Compensation(self.name.clone()));
    }
    ctx.counter -= 1;
    Ok(())
  }
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Workflow fixtures ---

pub struct Harness {
  pub records: Arc<InMemoryRecordService>,
  pub channels: Arc<InMemoryChannelService>,
  pub storage: Arc<InMemoryFileStorage>,
}

impl Harness {
  pub fn new() -> Self {
    Self::with_storage(InMemoryFileStorage::new())
  }

  pub fn with_storage(storage: Arc<InMemoryFileStorage>) -> Self {
    Self {
      records: InMemoryRecordService::new(),
      channels: InMemoryChannelService::new(),
      storage,
    }
  }

  pub fn services(&self) -> WorkflowServices {
    WorkflowServices::new(self.records.clone(), self.channels.clone(), self.storage.clone())
  }
}

pub fn test_config() -> WorkflowConfig {
  WorkflowConfig::default().with_channel_open_timeout(Duration::from_millis(200))
}

pub fn exam_date() -> NaiveDate {
  NaiveDate::from_ymd_opt(2026, 4, 20).expect("valid date")
}

pub fn sample_items() -> Vec<ItemDescriptor> {
  vec![
    ItemDescriptor {
      item_number: 1,
      item_type: "multiple_choice".to_string(),
      sub_item_number: None,
      answer: "3".to_string(),
      answer_count: 1,
      score: 5.0,
    },
    ItemDescriptor {
      item_number: 2,
      item_type: "short_answer".to_string(),
      sub_item_number: Some(1),
      answer: "photosynthesis".to_string(),
      answer_count: 1,
      score: 2.5,
    },
  ]
}

pub fn batch_file(i: usize) -> FileHandle {
  FileHandle::new(format!("sheet_{i}.png"), Some("image/png"), vec![i as u8; 16])
}

/// A validated context with `batch_count` batch files and no primary file.
pub fn context_with_batch(batch_count: usize) -> ContextBuilder {
  ContextBuilder::new("Biology midterm", exam_date())
    .items(sample_items())
    .batch_files((1..=batch_count).map(batch_file))
}

/// Progress sink that appends every message to a shared vector.
pub fn progress_recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Send + Sync + 'static) {
  let log = Arc::new(Mutex::new(Vec::new()));
  let sink_log = log.clone();
  (log, move |msg: &str| sink_log.lock().push(msg.to_string()))
}

pub fn build(builder: ContextBuilder) -> WorkflowContext {
  builder.build().expect("valid workflow input")
}
