#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Bounded background worker pool.
//!
//! A single coordinator task owns the FIFO queue and the idle/busy partition
//! of a fixed number of execution units. Units run one job at a time on the
//! blocking thread pool and talk to the coordinator only through channels:
//! jobs go in, progress and results come out. Callers interact with a task
//! through its [`TaskHandle`].
//!
//! The pool is generic over a [`JobExecutor`], which defines the job and
//! output types and how a job is executed.

pub mod pool;
pub mod progress;
pub mod task;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use pool::{PoolConfig, PoolStats, WorkerPool};
pub use progress::{ProgressCallback, SilentProgress, null_progress};
pub use task::{TaskEvent, TaskHandle, TaskId};

/// Executes jobs on behalf of the pool's execution units.
///
/// One executor instance is shared (immutably) by every unit. Mutable
/// per-unit data, such as caches, lives in [`Self::UnitState`], which each
/// unit owns exclusively and loses when it crashes.
pub trait JobExecutor: Send + Sync + 'static {
    /// Job payload.
    type Job: Send + 'static;
    /// Successful result.
    type Output: Send + 'static;
    /// State owned by a single execution unit across jobs.
    type UnitState: Default + Send + 'static;

    /// Runs `job` to completion on the calling (blocking) thread.
    ///
    /// # Errors
    ///
    /// Returns [`JobError`] when the job cannot produce a result or observes
    /// cancellation.
    fn execute(
        &self,
        state: &mut Self::UnitState,
        job: Self::Job,
        ctx: &JobContext,
    ) -> Result<Self::Output, JobError>;
}

type ProgressSink = Box<dyn Fn(f64, &str) + Send + Sync>;

/// Per-job handle given to [`JobExecutor::execute`] for progress reporting
/// and cooperative cancellation.
pub struct JobContext {
    task_id: TaskId,
    cancel: CancellationToken,
    progress: ProgressSink,
}

impl JobContext {
    pub(crate) fn new(task_id: TaskId, cancel: CancellationToken, progress: ProgressSink) -> Self {
        Self {
            task_id,
            cancel,
            progress,
        }
    }

    /// Creates a context that discards progress and is never cancelled.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(TaskId::new(), CancellationToken::new(), Box::new(|_, _| {}))
    }

    /// Like [`Self::detached`], but with cancellation already requested.
    #[must_use]
    pub fn cancelled() -> Self {
        let ctx = Self::detached();
        ctx.cancel.cancel();
        ctx
    }

    /// Returns the identifier of the task being executed.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Reports the completed fraction of the job, clamped to `[0, 1]`.
    pub fn report(&self, fraction: f64, label: &str) {
        (self.progress)(fraction.clamp(0.0, 1.0), label);
    }

    /// Returns `true` if cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Yield point: fails with [`JobError::Cancelled`] once cancellation
    /// was requested.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Cancelled`] if the task was cancelled.
    pub fn checkpoint(&self) -> Result<(), JobError> {
        if self.is_cancelled() {
            Err(JobError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Errors a job reports from [`JobExecutor::execute`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// The job observed a cancellation request.
    #[error("Job cancelled")]
    Cancelled,

    /// The job could not produce a result.
    #[error("Job failed: {message}")]
    Failed {
        /// Description of what went wrong.
        message: String,
    },
}

/// Terminal failure of a task, delivered through its [`TaskHandle`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The job returned an error.
    #[error("Task failed: {message}")]
    Failed {
        /// Description of what went wrong.
        message: String,
    },

    /// The task was cancelled before or while running.
    #[error("Task cancelled")]
    Cancelled,

    /// The execution unit running the task crashed.
    #[error("Execution unit crashed: {message}")]
    Crashed {
        /// Panic payload or failure description.
        message: String,
    },

    /// The pool was terminated before the task finished.
    #[error("Worker pool shut down")]
    Shutdown,
}

impl From<JobError> for TaskError {
    fn from(value: JobError) -> Self {
        match value {
            JobError::Cancelled => Self::Cancelled,
            JobError::Failed { message } => Self::Failed { message },
        }
    }
}

/// Errors returned by [`WorkerPool`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The pool no longer accepts work.
    #[error("Worker pool has been terminated")]
    Terminated,
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn job_errors_map_to_task_errors() {
        assert_eq!(TaskError::from(JobError::Cancelled), TaskError::Cancelled);
        assert_eq!(
            TaskError::from(JobError::Failed {
                message: "boom".to_string()
            }),
            TaskError::Failed {
                message: "boom".to_string()
            }
        );
    }

    #[test]
    fn context_clamps_progress_and_observes_cancel() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let token = CancellationToken::new();
        let ctx = JobContext::new(
            TaskId::new(),
            token.clone(),
            Box::new(move |fraction, label| {
                sink.lock().unwrap().push((fraction, label.to_string()));
            }),
        );

        ctx.report(1.5, "over");
        ctx.report(-0.5, "under");
        assert!(ctx.checkpoint().is_ok());

        token.cancel();
        assert_eq!(ctx.checkpoint(), Err(JobError::Cancelled));

        let seen = seen.lock().unwrap();
        assert!((seen[0].0 - 1.0).abs() < f64::EPSILON);
        assert!(seen[1].0.abs() < f64::EPSILON);
        assert_eq!(seen[1].1, "under");
    }

    #[test]
    fn cancelled_context_fails_every_checkpoint() {
        let ctx = JobContext::cancelled();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.checkpoint(), Err(JobError::Cancelled));
        assert!(!JobContext::detached().is_cancelled());
    }
}
