// sagaflow/src/workflow/mod.rs

//! The record-intake workflow: create a record, open its push channel, then upload
//! its primary file and its batch of files, undoing everything on failure.

pub mod config;
pub mod context;
pub mod error;
pub mod factory;
pub mod steps;

pub use config::WorkflowConfig;
pub use context::{
  ContextBuilder, FileHandle, ItemDescriptor, QuestionDraft, SubQuestionDraft, WorkflowContext, WorkflowInput,
  WorkflowOutput,
};
pub use error::{WorkflowError, WorkflowResult};
pub use factory::{build_workflow, WorkflowServices};
