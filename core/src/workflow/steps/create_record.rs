// sagaflow/src/workflow/steps/create_record.rs

use crate::core::step::Step;
use crate::services::{CreateRecordRequest, RecordService};
use crate::workflow::context::WorkflowContext;
use crate::workflow::error::WorkflowError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{event, Level};

/// Creates the record and stores its id and code. Compensation deletes it by code.
pub struct CreateRecordStep {
  records: Arc<dyn RecordService>,
  timeout: Option<Duration>,
}

impl CreateRecordStep {
  pub const NAME: &'static str = "create_record";

  pub fn new(records: Arc<dyn RecordService>, timeout: Option<Duration>) -> Self {
    Self { records, timeout }
  }
}

#[async_trait]
impl Step<WorkflowContext, WorkflowError> for CreateRecordStep {
  fn name(&self) -> &str {
    Self::NAME
  }

  fn timeout(&self) -> Option<Duration> {
    self.timeout
  }

  async fn execute(&self, ctx: &mut WorkflowContext) -> Result<(), WorkflowError> {
    ctx.report("Creating record...");

    let request = CreateRecordRequest {
      name: ctx.input.record_name.clone(),
      date: ctx.input.record_date,
      items: ctx.input.items.clone(),
    };
    let created = self
      .records
      .create(&request)
      .await
      .map_err(|source| WorkflowError::RecordCreationFailed { source })?;

    event!(Level::INFO, record_id = created.id, record_code = %created.code, "Record created.");
    ctx.output.record_id = Some(created.id);
    ctx.output.record_code = Some(created.code);
    Ok(())
  }

  async fn compensate(&self, ctx: &mut WorkflowContext) -> Result<(), WorkflowError> {
    let Some(code) = ctx.output.record_code.clone() else {
      return Ok(());
    };
    ctx.report("Deleting record...");

    match self.records.delete_by_code(&code).await {
      Ok(()) => event!(Level::INFO, record_code = %code, "Record deleted."),
      // Someone else already removed it; the undo is done either way.
      Err(e) if e.is_not_found() => event!(Level::DEBUG, record_code = %code, "Record already gone."),
      Err(source) => {
        return Err(WorkflowError::CompensationFailed {
          step_name: Self::NAME.to_string(),
          source,
        })
      }
    }
    Ok(())
  }
}
