// sagaflow/src/workflow/steps/mod.rs

//! The four steps of the record-intake workflow, in execution order.

pub mod create_record;
pub mod open_channel;
pub mod upload_batch;
pub mod upload_primary;

pub use create_record::CreateRecordStep;
pub use open_channel::OpenChannelStep;
pub use upload_batch::UploadBatchFilesStep;
pub use upload_primary::UploadPrimaryFileStep;
