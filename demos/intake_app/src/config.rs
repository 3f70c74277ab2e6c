// demos/intake_app/src/config.rs

use crate::errors::{AppError, Result};
use chrono::NaiveDate;
use dotenvy::dotenv;
use sagaflow::WorkflowConfig;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub workflow: WorkflowConfig,

  // What the demo run submits
  pub record_name: String,
  pub record_date: NaiveDate,
  pub batch_files: usize,
  pub with_primary_file: bool,

  // Failure injection for the in-memory services
  pub fail_upload_at: Option<usize>,
  pub silent_channel: bool,
}

fn parse_var<T>(var_name: &str) -> Result<Option<T>>
where
  T: std::str::FromStr,
  T::Err: std::fmt::Display,
{
  match env::var(var_name) {
    Ok(raw) => raw
      .trim()
      .parse::<T>()
      .map(Some)
      .map_err(|e| AppError::Config(format!("Invalid {}: {}", var_name, e))),
    Err(env::VarError::NotPresent) => Ok(None),
    Err(e) => Err(AppError::Config(format!("Unreadable {}: {}", var_name, e))),
  }
}

fn millis(var_name: &str) -> Result<Option<Duration>> {
  Ok(parse_var::<u64>(var_name)?.map(Duration::from_millis))
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present

    let mut workflow = WorkflowConfig::default()
      .with_record_timeout(millis("SAGA_RECORD_TIMEOUT_MS")?)
      .with_upload_timeout(millis("SAGA_UPLOAD_TIMEOUT_MS")?);
    if let Some(timeout) = millis("SAGA_CHANNEL_OPEN_TIMEOUT_MS")? {
      workflow = workflow.with_channel_open_timeout(timeout);
    }
    if let Ok(content_type) = env::var("SAGA_DEFAULT_BATCH_CONTENT_TYPE") {
      workflow.default_batch_content_type = content_type;
    }

    let record_name = env::var("DEMO_RECORD_NAME").unwrap_or_else(|_| "Demo midterm".to_string());
    let record_date = match env::var("DEMO_RECORD_DATE") {
      Ok(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|e| AppError::Config(format!("Invalid DEMO_RECORD_DATE: {}", e)))?,
      Err(_) => chrono::Local::now().date_naive(),
    };
    let batch_files = parse_var::<usize>("DEMO_BATCH_FILES")?.unwrap_or(3);
    let with_primary_file = parse_var::<bool>("DEMO_PRIMARY_FILE")?.unwrap_or(true);
    let fail_upload_at = parse_var::<usize>("DEMO_FAIL_UPLOAD_AT")?;
    let silent_channel = parse_var::<bool>("DEMO_SILENT_CHANNEL")?.unwrap_or(false);

    tracing::info!("Application configuration loaded successfully.");
    tracing::debug!(config = ?workflow, "Workflow settings");

    Ok(Self {
      workflow,
      record_name,
      record_date,
      batch_files,
      with_primary_file,
      fail_upload_at,
      silent_channel,
    })
  }
}
