//! Progress reporting for export runs.
//!
//! The controller pushes every visible change of a run through a
//! [`ProgressCallback`], so it never depends on how (or whether) progress
//! is rendered. The terminal front end supplies an `indicatif` bar.

use std::sync::Arc;

/// Receives progress updates from an export run.
///
/// Implementations must be `Send + Sync` so one instance can be shared via
/// `Arc` between the controller and whoever owns the renderer.
pub trait ProgressCallback: Send + Sync {
    /// Sets the completion percentage (`0..=100`).
    fn set_position(&self, percent: u8);

    /// Replaces the status message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Emits one line that was just appended to the task log.
    fn log_line(&self, line: &str);

    /// Marks the run as finished successfully.
    fn finish(&self, msg: String);

    /// Marks the run as ended without success (failed or stopped).
    fn abandon(&self, msg: String);
}

/// A [`ProgressCallback`] that ignores everything.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_position(&self, _percent: u8) {}
    fn set_message(&self, _msg: String) {}
    fn log_line(&self, _line: &str) {}
    fn finish(&self, _msg: String) {}
    fn abandon(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`] instance.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
