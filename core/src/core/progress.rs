// sagaflow/src/core/progress.rs

//! The progress sink carried explicitly by a context.

use std::sync::Arc;

/// A fire-and-forget callback receiving human-readable status lines.
///
/// Sinks are invoked synchronously from inside steps and must return promptly;
/// anything slow (UI updates, network) belongs behind a channel on the caller's side.
pub type ProgressSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Reports `message` through `sink` when one is set.
pub fn report(sink: Option<&ProgressSink>, message: &str) {
  if let Some(sink) = sink {
    sink(message);
  }
  tracing::trace!(target: "sagaflow::progress", status = message, "Progress reported.");
}
