// sagaflow/src/workflow/config.rs

use std::time::Duration;

/// Tuning knobs of the record-intake workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
  /// How long the open-channel step waits for the server to confirm the handshake.
  pub channel_open_timeout: Duration,
  /// Deadline for the create-record step. `None` waits as long as the service takes.
  pub record_timeout: Option<Duration>,
  /// Deadline applied to each of the two upload steps as a whole.
  pub upload_timeout: Option<Duration>,
  /// Content type sent for batch files that carry none.
  pub default_batch_content_type: String,
}

impl WorkflowConfig {
  pub const DEFAULT_CHANNEL_OPEN_TIMEOUT: Duration = Duration::from_secs(2);
  pub const DEFAULT_BATCH_CONTENT_TYPE: &'static str = "image/jpeg";

  pub fn with_channel_open_timeout(mut self, timeout: Duration) -> Self {
    self.channel_open_timeout = timeout;
    self
  }

  pub fn with_record_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.record_timeout = timeout;
    self
  }

  pub fn with_upload_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.upload_timeout = timeout;
    self
  }
}

impl Default for WorkflowConfig {
  fn default() -> Self {
    Self {
      channel_open_timeout: Self::DEFAULT_CHANNEL_OPEN_TIMEOUT,
      record_timeout: None,
      upload_timeout: None,
      default_batch_content_type: Self::DEFAULT_BATCH_CONTENT_TYPE.to_string(),
    }
  }
}
