//! Progress reporting for imports.
//!
//! The import loop reports through [`ProgressCallback`] so the CLI can
//! render `indicatif` bars while tests and library callers stay silent.

use std::sync::Arc;

/// Receives progress updates. Shared across block tasks, hence
/// `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// Sets the number of units in the current phase.
    fn set_total(&self, total: u64);

    /// Advances by `delta` units.
    fn inc(&self, delta: u64);

    /// Replaces the label shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Completes the indicator, leaving `msg` behind.
    fn finish(&self, msg: String);

    /// Completes and removes the indicator.
    fn finish_and_clear(&self);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
    fn finish_and_clear(&self) {}
}

/// Shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
