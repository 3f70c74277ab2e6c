pub mod control;
pub mod progress;
pub mod step;

// Re-export key types for easier access from other modules (and lib.rs)
pub use control::SagaState;
pub use progress::ProgressSink;
pub use step::{BoxedStep, Step};
