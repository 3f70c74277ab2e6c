// sagaflow/examples/basic_saga.rs

use async_trait::async_trait;
use sagaflow::{Saga, SagaError, Step};
use tracing::info;

// 1. Define the context the steps share.
#[derive(Debug, Default)]
struct TransferContext {
  reserved: bool,
  charged: bool,
  log: Vec<String>,
}

// 2. Define an error type. It must be From<SagaError>.
#[derive(Debug, thiserror::Error)]
enum TransferError {
  #[error("inventory unavailable")]
  Inventory,
  #[error("card declined")]
  Declined,
  #[error(transparent)]
  Saga(#[from] SagaError),
}

// 3. Implement the steps.
struct Reserve;
struct Charge;
struct Ship;

#[async_trait]
impl Step<TransferContext, TransferError> for Reserve {
  fn name(&self) -> &str {
    "reserve"
  }
  async fn execute(&self, ctx: &mut TransferContext) -> Result<(), TransferError> {
    ctx.reserved = true;
    ctx.log.push("reserved".into());
    Ok(())
  }
  async fn compensate(&self, ctx: &mut TransferContext) -> Result<(), TransferError> {
    if ctx.reserved {
      ctx.reserved = false;
      ctx.log.push("released".into());
    }
    Ok(())
  }
}

#[async_trait]
impl Step<TransferContext, TransferError> for Charge {
  fn name(&self) -> &str {
    "charge"
  }
  async fn execute(&self, ctx: &mut TransferContext) -> Result<(), TransferError> {
    ctx.charged = true;
    ctx.log.push("charged".into());
    Ok(())
  }
  async fn compensate(&self, ctx: &mut TransferContext) -> Result<(), TransferError> {
    if ctx.charged {
      ctx.charged = false;
      ctx.log.push("refunded".into());
    }
    Ok(())
  }
}

#[async_trait]
impl Step<TransferContext, TransferError> for Ship {
  fn name(&self) -> &str {
    "ship"
  }
  async fn execute(&self, _ctx: &mut TransferContext) -> Result<(), TransferError> {
    // Always fails so the example shows the rollback.
    Err(TransferError::Declined)
  }
  async fn compensate(&self, _ctx: &mut TransferContext) -> Result<(), TransferError> {
    Err(TransferError::Inventory)
  }
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Basic Saga Example ---");

  // 4. Chain the steps; they run in insertion order.
  let mut saga = Saga::<TransferContext, TransferError>::new()
    .add_step(Reserve)
    .add_step(Charge)
    .add_step(Ship);

  // 5. Run against a fresh context.
  let mut ctx = TransferContext::default();
  match saga.execute(&mut ctx).await {
    Ok(()) => info!("Saga completed."),
    Err(e) => info!(error = %e, state = ?saga.state(), "Saga failed and was rolled back."),
  }

  info!("Log: {:?}", ctx.log);
  assert_eq!(ctx.log, vec!["reserved", "charged", "refunded", "released"]);
}
