// demos/intake_app/src/main.rs

mod config;
mod errors;

use crate::config::AppConfig;
use crate::errors::Result as AppResult;

use sagaflow::services::{InMemoryChannelService, InMemoryFileStorage, InMemoryRecordService, OpenBehavior};
use sagaflow::{build_workflow, ContextBuilder, FileHandle, ItemDescriptor, WorkflowServices};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> AppResult<()> {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO) // Default level
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()) // Allow RUST_LOG override
    .with_span_events(FmtSpan::CLOSE) // Log when spans close, showing duration
    .init();

  let app_config = AppConfig::from_env().inspect_err(|e| {
    tracing::error!(error = %e, "Failed to load application configuration.");
  })?;

  // In-memory collaborators, optionally scripted to fail
  let records = InMemoryRecordService::new();
  let channels = InMemoryChannelService::new();
  if app_config.silent_channel {
    channels.set_behavior(OpenBehavior::Silent);
  }
  let storage = InMemoryFileStorage::new();
  if let Some(index) = app_config.fail_upload_at {
    storage.fail_put_at(index);
  }

  let services = WorkflowServices::new(records.clone(), channels.clone(), storage.clone());
  let mut saga = build_workflow(services, &app_config.workflow);

  let mut builder = ContextBuilder::new(app_config.record_name.clone(), app_config.record_date)
    .item(ItemDescriptor {
      item_number: 1,
      item_type: "multiple_choice".to_string(),
      sub_item_number: None,
      answer: "2".to_string(),
      answer_count: 1,
      score: 4.0,
    })
    .batch_files((1..=app_config.batch_files).map(|i| {
      FileHandle::new(format!("answer_sheet_{i}.png"), Some("image/png"), vec![0u8; 1024])
    }))
    .on_progress(|msg| tracing::info!(target: "intake_app::progress", "{}", msg));
  if app_config.with_primary_file {
    builder = builder.primary_file(FileHandle::new(
      "attendance.xlsx",
      None,
      b"student_id,name\n".to_vec(),
    ));
  }
  let mut ctx = builder.build()?;

  match saga.execute(&mut ctx).await {
    Ok(()) => {
      tracing::info!(
        record_id = ?ctx.output.record_id,
        record_code = ?ctx.output.record_code,
        uploaded = ctx.output.uploaded_keys.len(),
        "Record intake completed."
      );
      Ok(())
    }
    Err(e) => {
      tracing::error!(
        error = %e,
        compensation_failures = saga.compensation_failures().len(),
        records_left = records.records().len(),
        open_channels = channels.open_channels().len(),
        objects_left = storage.object_keys().len(),
        "Record intake failed and was rolled back."
      );
      Err(e.into())
    }
  }
}
