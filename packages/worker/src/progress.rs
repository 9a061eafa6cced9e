//! Rendering-agnostic progress sink for pool tasks.
//!
//! [`TaskHandle::watch`](crate::TaskHandle::watch) translates task events
//! into calls on a [`ProgressCallback`]. Binaries plug in a terminal bar;
//! library callers and tests use [`null_progress`].

use std::sync::Arc;

/// Positions a task's `[0, 1]` completion fraction is spread over.
pub const PROGRESS_SCALE: u64 = 1000;

/// Receives the progress of one task.
///
/// Shared as `Arc<dyn ProgressCallback>`, so implementations use interior
/// mutability and must be `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// Announces how many positions make up the whole task.
    fn set_total(&self, total: u64);

    /// Moves to an absolute position.
    fn set_position(&self, pos: u64);

    /// Replaces the status text.
    fn set_message(&self, msg: String);

    /// Marks the task finished and leaves `msg` visible.
    fn finish(&self, msg: String);

    /// Marks the task finished and hides it.
    fn finish_and_clear(&self);

    /// Moves to `fraction` of [`PROGRESS_SCALE`], clamped to `[0, 1]`.
    fn set_fraction(&self, fraction: f64) {
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let pos = (fraction.clamp(0.0, 1.0) * PROGRESS_SCALE as f64).round() as u64;
        self.set_position(pos);
    }
}

/// Discards every update.
pub struct SilentProgress;

impl ProgressCallback for SilentProgress {
    fn set_total(&self, _: u64) {}
    fn set_position(&self, _: u64) {}
    fn set_message(&self, _: String) {}
    fn finish(&self, _: String) {}
    fn finish_and_clear(&self) {}
}

/// Shared [`SilentProgress`] for callers that do not display progress.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(SilentProgress)
}
