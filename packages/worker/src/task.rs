//! Task identity, lifecycle events, and the caller-side handle.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::progress::{PROGRESS_SCALE, ProgressCallback};
use crate::TaskError;

/// Opaque identifier of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle events delivered to a [`TaskHandle`].
///
/// A task produces `Queued` (only when no unit was idle), then `Dispatched`,
/// any number of `Progress` events, and exactly one terminal event.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent<O> {
    /// No unit was idle; the task waits at `position` (1-based) in the queue.
    Queued {
        /// Queue position at submission time.
        position: usize,
    },
    /// The task was assigned to an execution unit.
    Dispatched {
        /// Index of the unit running the task.
        unit: usize,
    },
    /// The job reported progress.
    Progress {
        /// Completed fraction in `[0, 1]`.
        fraction: f64,
        /// Short description of the current step.
        label: String,
    },
    /// The job finished successfully.
    Completed(O),
    /// The job failed, crashed, was cancelled, or the pool shut down.
    Failed(TaskError),
}

impl<O> TaskEvent<O> {
    /// Returns `true` for `Completed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }
}

/// Coordinator-side record of a submitted task.
pub(crate) struct Task<J, O> {
    pub id: TaskId,
    pub job: J,
    pub cancel: CancellationToken,
    pub events: mpsc::UnboundedSender<TaskEvent<O>>,
}

impl<J, O> Task<J, O> {
    /// Delivers a terminal failure, consuming the task.
    pub fn fail(self, error: TaskError) {
        let _ = self.events.send(TaskEvent::Failed(error));
    }
}

/// Caller-side handle to a submitted task.
///
/// Events arrive in the order the coordinator produced them; progress for
/// this task always precedes its terminal event.
pub struct TaskHandle<O> {
    id: TaskId,
    events: mpsc::UnboundedReceiver<TaskEvent<O>>,
    cancel: CancellationToken,
    cancels: mpsc::UnboundedSender<TaskId>,
}

impl<O> TaskHandle<O> {
    pub(crate) const fn new(
        id: TaskId,
        events: mpsc::UnboundedReceiver<TaskEvent<O>>,
        cancel: CancellationToken,
        cancels: mpsc::UnboundedSender<TaskId>,
    ) -> Self {
        Self {
            id,
            events,
            cancel,
            cancels,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Waits for the next lifecycle event. Returns `None` once the terminal
    /// event has been consumed.
    pub async fn next_event(&mut self) -> Option<TaskEvent<O>> {
        self.events.recv().await
    }

    /// Returns the next event if one is already available.
    pub fn try_next_event(&mut self) -> Option<TaskEvent<O>> {
        self.events.try_recv().ok()
    }

    /// Requests cancellation.
    ///
    /// A queued task fails with [`TaskError::Cancelled`] without running. A
    /// running job observes the request at its next yield point.
    pub fn cancel(&self) {
        self.cancel.cancel();
        let _ = self.cancels.send(self.id);
    }

    /// Drains events until the task terminates.
    ///
    /// # Errors
    ///
    /// Returns the task's [`TaskError`], or [`TaskError::Shutdown`] if the
    /// pool went away without delivering a terminal event.
    pub async fn wait(mut self) -> Result<O, TaskError> {
        while let Some(event) = self.events.recv().await {
            match event {
                TaskEvent::Completed(output) => return Ok(output),
                TaskEvent::Failed(error) => return Err(error),
                TaskEvent::Queued { .. }
                | TaskEvent::Dispatched { .. }
                | TaskEvent::Progress { .. } => {}
            }
        }
        Err(TaskError::Shutdown)
    }

    /// Like [`Self::wait`], forwarding progress to `progress`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::wait`].
    pub async fn watch(mut self, progress: Arc<dyn ProgressCallback>) -> Result<O, TaskError> {
        while let Some(event) = self.events.recv().await {
            match event {
                TaskEvent::Queued { position } => {
                    progress.set_message(format!("queued at position {position}"));
                }
                TaskEvent::Dispatched { unit } => {
                    progress.set_total(PROGRESS_SCALE);
                    progress.set_message(format!("running on unit {unit}"));
                }
                TaskEvent::Progress { fraction, label } => {
                    progress.set_fraction(fraction);
                    progress.set_message(label);
                }
                TaskEvent::Completed(output) => {
                    progress.finish("done".to_string());
                    return Ok(output);
                }
                TaskEvent::Failed(error) => {
                    progress.finish(format!("failed: {error}"));
                    return Err(error);
                }
            }
        }
        progress.finish_and_clear();
        Err(TaskError::Shutdown)
    }
}
