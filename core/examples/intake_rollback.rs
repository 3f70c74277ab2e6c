// sagaflow/examples/intake_rollback.rs

//! Runs the record-intake workflow against in-memory services and makes the third
//! batch upload fail, showing what the rollback leaves behind.

use chrono::NaiveDate;
use sagaflow::services::{InMemoryChannelService, InMemoryFileStorage, InMemoryRecordService};
use sagaflow::{build_workflow, ContextBuilder, FileHandle, ItemDescriptor, WorkflowConfig, WorkflowServices};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  let records = InMemoryRecordService::new();
  let channels = InMemoryChannelService::new();
  let storage = InMemoryFileStorage::new();
  storage.fail_put_at(3);

  let services = WorkflowServices::new(records.clone(), channels.clone(), storage.clone());
  let mut saga = build_workflow(services, &WorkflowConfig::default());

  let date = NaiveDate::from_ymd_opt(2026, 6, 1).ok_or("invalid date")?;
  let mut ctx = ContextBuilder::new("Chemistry final", date)
    .item(ItemDescriptor {
      item_number: 1,
      item_type: "short_answer".to_string(),
      sub_item_number: None,
      answer: "NaCl".to_string(),
      answer_count: 1,
      score: 10.0,
    })
    .batch_files((1..=4).map(|i| FileHandle::new(format!("page_{i}.jpg"), Some("image/jpeg"), vec![0u8; 64])))
    .on_progress(|msg| info!(target: "progress", "{msg}"))
    .build()?;

  if let Err(e) = saga.execute(&mut ctx).await {
    info!(error = %e, "Workflow failed.");
  }

  info!(
    records_left = records.records().len(),
    open_channels = channels.open_channels().len(),
    objects_left = storage.object_keys().len(),
    deleted = ?storage.deleted_keys(),
    "State after rollback."
  );
  Ok(())
}
