// sagaflow/src/workflow/steps/open_channel.rs

use crate::core::step::Step;
use crate::services::{ChannelOpening, ChannelSignal, PushChannelService};
use crate::workflow::context::WorkflowContext;
use crate::workflow::error::WorkflowError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{event, Level};

/// Opens the server-push channel for the record before any upload starts, so that
/// progress events emitted by the storage pipeline are not missed.
///
/// Only the handshake is bounded by `open_timeout`; the step does not wait for a
/// first message.
pub struct OpenChannelStep {
  channels: Arc<dyn PushChannelService>,
  open_timeout: Duration,
}

impl OpenChannelStep {
  pub const NAME: &'static str = "open_channel";

  pub fn new(channels: Arc<dyn PushChannelService>, open_timeout: Duration) -> Self {
    Self { channels, open_timeout }
  }
}

#[async_trait]
impl Step<WorkflowContext, WorkflowError> for OpenChannelStep {
  fn name(&self) -> &str {
    Self::NAME
  }

  async fn execute(&self, ctx: &mut WorkflowContext) -> Result<(), WorkflowError> {
    ctx.report("Connecting to server...");

    let code = ctx.output.record_code.clone().ok_or_else(|| WorkflowError::ChannelOpenFailed {
      reason: "record code is required".to_string(),
    })?;

    let ChannelOpening { handle, signal } =
      self
        .channels
        .open(&code)
        .await
        .map_err(|e| WorkflowError::ChannelOpenFailed { reason: e.to_string() })?;

    let failure = match tokio::time::timeout(self.open_timeout, signal).await {
      Ok(Ok(ChannelSignal::Opened)) => None,
      Ok(Ok(ChannelSignal::Error(msg))) => Some(format!("server reported an error: {msg}")),
      Ok(Err(_)) => Some("channel dropped before confirming the connection".to_string()),
      Err(_) => Some(format!("no confirmation within {:?}", self.open_timeout)),
    };

    if let Some(reason) = failure {
      // This step will not be compensated, so the half-open channel is released here.
      if let Err(e) = self.channels.close(&handle).await {
        event!(Level::WARN, channel_id = handle.id, error = %e, "Failed to release half-open channel.");
      }
      return Err(WorkflowError::ChannelOpenFailed { reason });
    }

    event!(Level::INFO, channel_id = handle.id, record_code = %code, "Channel open.");
    ctx.output.channel = Some(handle);
    Ok(())
  }

  async fn compensate(&self, ctx: &mut WorkflowContext) -> Result<(), WorkflowError> {
    let Some(handle) = ctx.output.channel.take() else {
      return Ok(());
    };
    self
      .channels
      .close(&handle)
      .await
      .map_err(|source| WorkflowError::CompensationFailed {
        step_name: Self::NAME.to_string(),
        source,
      })?;
    event!(Level::INFO, channel_id = handle.id, "Channel closed.");
    Ok(())
  }
}
