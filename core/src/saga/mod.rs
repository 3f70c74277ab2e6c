// sagaflow/src/saga/mod.rs

//! Defines the `Saga<C, E>` orchestrator, its construction and its execution logic.

pub mod definition;
pub mod execution;

// Re-export the main Saga struct
pub use definition::Saga;
