// sagaflow/src/lib.rs

//! Sagaflow: an ASYNC saga orchestrator for Rust.
//!
//! Sagaflow runs an ordered list of side-effecting steps against independent
//! services that share no transaction, and manufactures consistency through
//! compensation:
//!  - Each step pairs an `execute` with a best-effort `compensate`.
//!  - Steps run strictly in order; the first failure stops the run.
//!  - Already-executed steps are compensated in reverse order, every compensator
//!    runs even if an earlier one fails, and the original failure is returned.
//!  - Optional per-step deadlines.
//!  - A ready-made record-intake workflow (`workflow`) built on collaborator
//!    traits (`services`), with in-memory collaborators for tests and demos.

pub mod core;
pub mod error;
pub mod saga;
pub mod services;
pub mod workflow;

// --- Re-exports for the Public API ---

pub use crate::core::control::SagaState;
pub use crate::core::progress::ProgressSink;
pub use crate::core::step::{BoxedStep, Step};

pub use crate::saga::definition::Saga;

pub use crate::error::{SagaError, SagaResult};

pub use crate::services::{
  ChannelHandle, FileStorageService, PushChannelService, RecordService, ServiceError,
};

pub use crate::workflow::{
  build_workflow, ContextBuilder, FileHandle, ItemDescriptor, WorkflowConfig, WorkflowContext, WorkflowError,
  WorkflowServices,
};

/*
    Core Workflow:
    1. Define a context struct `MyCtx` holding the run's inputs and the outputs steps write.
    2. Implement `Step<MyCtx, MyError>` for each unit of work, where `MyError: From<SagaError>`.
       `compensate` must be a no-op when there is nothing to undo.
    3. Chain `Saga::new().add_step(..).add_step(..)`.
    4. Create a fresh `MyCtx` and call `saga.execute(&mut ctx).await`.
    5. On `Err`, compensation has already run; `saga.compensation_failures()` lists
       compensators that could not finish.
*/
