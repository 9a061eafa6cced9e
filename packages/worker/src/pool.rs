//! Worker pool coordinator and execution units.
//!
//! The coordinator is a single tokio task that owns every piece of mutable
//! scheduling state (queue, idle set, busy map, in-flight tasks). Units are
//! tokio tasks that hand each job to [`tokio::task::spawn_blocking`] so that
//! CPU-heavy analytics never stall the runtime.
//!
//! A unit whose job panics is considered crashed: its task fails with
//! [`TaskError::Crashed`], its [`JobExecutor::UnitState`] is discarded, and
//! a fresh unit takes its slot before it rejoins the idle set.

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::task::{Task, TaskEvent, TaskHandle, TaskId};
use crate::{JobContext, JobError, JobExecutor, SchedulerError, TaskError};

/// Default upper bound on the number of execution units.
pub const DEFAULT_POOL_SIZE: usize = 2;

/// Environment variable overriding the configured pool size.
pub const WORKERS_ENV: &str = "CRIME_INSIGHT_WORKERS";

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PoolConfig {
    /// Requested number of execution units.
    pub size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_POOL_SIZE,
        }
    }
}

impl PoolConfig {
    /// Applies the [`WORKERS_ENV`] override, if set to a valid number.
    #[must_use]
    pub fn with_env_override(self) -> Self {
        match std::env::var(WORKERS_ENV).ok().map(|v| v.trim().parse::<usize>()) {
            Some(Ok(size)) => Self { size },
            Some(Err(e)) => {
                log::warn!("Ignoring invalid {WORKERS_ENV}: {e}");
                self
            }
            None => self,
        }
    }

    /// Returns the effective pool size: the requested size bounded by the
    /// available hardware concurrency, and at least 1.
    #[must_use]
    pub fn resolved_size(&self) -> usize {
        let hardware = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        self.size.clamp(1, hardware.max(1))
    }
}

/// Snapshot of the pool's scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    /// Number of execution units.
    pub size: usize,
    /// Units waiting for work.
    pub idle: usize,
    /// Units running a job.
    pub busy: usize,
    /// Tasks waiting for a unit.
    pub queued: usize,
}

enum Command<J, O> {
    Submit(Task<J, O>),
    Stats(oneshot::Sender<PoolStats>),
    Terminate(oneshot::Sender<()>),
}

enum UnitMessage<O> {
    Progress {
        task_id: TaskId,
        fraction: f64,
        label: String,
    },
    Finished {
        unit: usize,
        task_id: TaskId,
        result: Result<O, JobError>,
    },
    Crashed {
        unit: usize,
        task_id: TaskId,
        message: String,
    },
}

struct Assignment<J> {
    task_id: TaskId,
    job: J,
    cancel: CancellationToken,
}

struct UnitSlot<J> {
    assign: mpsc::UnboundedSender<Assignment<J>>,
    handle: JoinHandle<()>,
}

struct InFlight<O> {
    unit: usize,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<TaskEvent<O>>,
}

/// A fixed-size pool of background execution units.
///
/// Dropping the pool behaves like [`Self::terminate`].
pub struct WorkerPool<E: JobExecutor> {
    commands: mpsc::UnboundedSender<Command<E::Job, E::Output>>,
    cancels: mpsc::UnboundedSender<TaskId>,
    size: usize,
}

impl<E: JobExecutor> WorkerPool<E> {
    /// Creates a pool sized by [`PoolConfig::resolved_size`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new(executor: E, config: &PoolConfig) -> Self {
        Self::with_size(executor, config.resolved_size())
    }

    /// Creates a pool with exactly `size` units (at least 1), ignoring the
    /// hardware bound.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn with_size(executor: E, size: usize) -> Self {
        let size = size.max(1);
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (cancels, cancel_rx) = mpsc::unbounded_channel();
        let (unit_tx, unit_rx) = mpsc::unbounded_channel();

        let executor = Arc::new(executor);
        let units = (0..size)
            .map(|unit| spawn_unit(Arc::clone(&executor), unit, unit_tx.clone()))
            .collect();

        let coordinator = Coordinator {
            executor,
            units,
            idle: (0..size).collect(),
            busy: HashMap::new(),
            queue: VecDeque::new(),
            in_flight: HashMap::new(),
            unit_tx,
        };

        log::info!("Starting worker pool with {size} execution unit(s)");
        tokio::spawn(coordinator.run(command_rx, cancel_rx, unit_rx));

        Self {
            commands,
            cancels,
            size,
        }
    }

    /// Returns the number of execution units.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Submits a job. It is dispatched at once if a unit is idle and
    /// appended to the FIFO queue otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Terminated`] after [`Self::terminate`].
    pub fn submit(&self, job: E::Job) -> Result<TaskHandle<E::Output>, SchedulerError> {
        let id = TaskId::new();
        let cancel = CancellationToken::new();
        let (events, events_rx) = mpsc::unbounded_channel();

        self.commands
            .send(Command::Submit(Task {
                id,
                job,
                cancel: cancel.clone(),
                events,
            }))
            .map_err(|_| SchedulerError::Terminated)?;

        Ok(TaskHandle::new(id, events_rx, cancel, self.cancels.clone()))
    }

    /// Returns a snapshot of the scheduling state.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Terminated`] after [`Self::terminate`].
    pub async fn stats(&self) -> Result<PoolStats, SchedulerError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Stats(tx))
            .map_err(|_| SchedulerError::Terminated)?;
        rx.await.map_err(|_| SchedulerError::Terminated)
    }

    /// Fails every queued and in-flight task with [`TaskError::Shutdown`]
    /// and stops all units. Subsequent submissions are rejected. Calling it
    /// again is a no-op.
    pub async fn terminate(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Terminate(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

fn spawn_unit<E: JobExecutor>(
    executor: Arc<E>,
    unit: usize,
    tx: mpsc::UnboundedSender<UnitMessage<E::Output>>,
) -> UnitSlot<E::Job> {
    let (assign, mut assignments) = mpsc::unbounded_channel::<Assignment<E::Job>>();

    let handle = tokio::spawn(async move {
        let mut state = E::UnitState::default();

        while let Some(Assignment {
            task_id,
            job,
            cancel,
        }) = assignments.recv().await
        {
            let executor = Arc::clone(&executor);
            let progress_tx = tx.clone();
            let mut unit_state = std::mem::take(&mut state);

            let joined = tokio::task::spawn_blocking(move || {
                let ctx = JobContext::new(
                    task_id,
                    cancel,
                    Box::new(move |fraction, label| {
                        let _ = progress_tx.send(UnitMessage::Progress {
                            task_id,
                            fraction,
                            label: label.to_string(),
                        });
                    }),
                );
                let result = executor.execute(&mut unit_state, job, &ctx);
                (unit_state, result)
            })
            .await;

            match joined {
                Ok((returned, result)) => {
                    state = returned;
                    let _ = tx.send(UnitMessage::Finished {
                        unit,
                        task_id,
                        result,
                    });
                }
                Err(e) => {
                    let message = if e.is_panic() {
                        panic_message(e.into_panic())
                    } else {
                        "execution unit was cancelled".to_string()
                    };
                    let _ = tx.send(UnitMessage::Crashed {
                        unit,
                        task_id,
                        message,
                    });
                    break;
                }
            }
        }

        log::debug!("Execution unit {unit} stopped");
    });

    UnitSlot { assign, handle }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "job panicked".to_string())
}

struct Coordinator<E: JobExecutor> {
    executor: Arc<E>,
    units: Vec<UnitSlot<E::Job>>,
    idle: VecDeque<usize>,
    busy: HashMap<usize, TaskId>,
    queue: VecDeque<Task<E::Job, E::Output>>,
    in_flight: HashMap<TaskId, InFlight<E::Output>>,
    unit_tx: mpsc::UnboundedSender<UnitMessage<E::Output>>,
}

impl<E: JobExecutor> Coordinator<E> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command<E::Job, E::Output>>,
        mut cancels: mpsc::UnboundedReceiver<TaskId>,
        mut unit_rx: mpsc::UnboundedReceiver<UnitMessage<E::Output>>,
    ) {
        loop {
            tokio::select! {
                biased;
                Some(message) = unit_rx.recv() => self.on_unit_message(message),
                Some(id) = cancels.recv() => self.on_cancel(id),
                command = commands.recv() => match command {
                    Some(Command::Submit(task)) => self.on_submit(task),
                    Some(Command::Stats(reply)) => {
                        let _ = reply.send(self.stats());
                    }
                    Some(Command::Terminate(reply)) => {
                        self.shutdown(&mut commands);
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        self.shutdown(&mut commands);
                        break;
                    }
                },
            }
        }
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.units.len(),
            idle: self.idle.len(),
            busy: self.busy.len(),
            queued: self.queue.len(),
        }
    }

    fn on_submit(&mut self, task: Task<E::Job, E::Output>) {
        if task.cancel.is_cancelled() {
            task.fail(TaskError::Cancelled);
            return;
        }

        if let Some(unit) = self.idle.pop_front() {
            self.dispatch(unit, task);
        } else {
            let position = self.queue.len() + 1;
            log::debug!("All units busy, queueing task {} at {position}", task.id);
            let _ = task.events.send(TaskEvent::Queued { position });
            self.queue.push_back(task);
        }
    }

    fn dispatch(&mut self, unit: usize, task: Task<E::Job, E::Output>) {
        let Task {
            id,
            job,
            cancel,
            events,
        } = task;

        log::debug!("Dispatching task {id} to unit {unit}");
        let _ = events.send(TaskEvent::Dispatched { unit });
        self.busy.insert(unit, id);
        self.in_flight.insert(
            id,
            InFlight {
                unit,
                cancel: cancel.clone(),
                events,
            },
        );

        let assignment = Assignment {
            task_id: id,
            job,
            cancel,
        };
        if self.units[unit].assign.send(assignment).is_err() {
            self.on_crash(unit, id, "execution unit stopped unexpectedly".to_string());
        }
    }

    /// Hands the queue head to `unit`, or marks it idle when nothing waits.
    fn release(&mut self, unit: usize) {
        self.busy.remove(&unit);
        while let Some(task) = self.queue.pop_front() {
            if task.cancel.is_cancelled() {
                task.fail(TaskError::Cancelled);
                continue;
            }
            self.dispatch(unit, task);
            return;
        }
        self.idle.push_back(unit);
    }

    fn on_unit_message(&mut self, message: UnitMessage<E::Output>) {
        match message {
            UnitMessage::Progress {
                task_id,
                fraction,
                label,
            } => {
                if let Some(task) = self.in_flight.get(&task_id) {
                    let _ = task.events.send(TaskEvent::Progress { fraction, label });
                }
            }
            UnitMessage::Finished {
                unit,
                task_id,
                result,
            } => {
                if let Some(task) = self.in_flight.remove(&task_id) {
                    let event = match result {
                        Ok(output) => TaskEvent::Completed(output),
                        Err(e) => {
                            log::debug!("Task {task_id} failed: {e}");
                            TaskEvent::Failed(e.into())
                        }
                    };
                    let _ = task.events.send(event);
                }
                self.release(unit);
            }
            UnitMessage::Crashed {
                unit,
                task_id,
                message,
            } => self.on_crash(unit, task_id, message),
        }
    }

    fn on_crash(&mut self, unit: usize, task_id: TaskId, message: String) {
        log::warn!("Execution unit {unit} crashed running task {task_id}: {message}");

        if let Some(task) = self.in_flight.remove(&task_id) {
            debug_assert_eq!(task.unit, unit);
            let _ = task.events.send(TaskEvent::Failed(TaskError::Crashed { message }));
        }

        self.units[unit].handle.abort();
        self.units[unit] = spawn_unit(Arc::clone(&self.executor), unit, self.unit_tx.clone());
        log::info!("Recreated execution unit {unit}");

        self.release(unit);
    }

    fn on_cancel(&mut self, id: TaskId) {
        if let Some(pos) = self.queue.iter().position(|task| task.id == id)
            && let Some(task) = self.queue.remove(pos)
        {
            log::debug!("Cancelled queued task {id}");
            task.fail(TaskError::Cancelled);
        }
    }

    fn shutdown(&mut self, commands: &mut mpsc::UnboundedReceiver<Command<E::Job, E::Output>>) {
        commands.close();
        while let Ok(command) = commands.try_recv() {
            match command {
                Command::Submit(task) => task.fail(TaskError::Shutdown),
                Command::Stats(reply) => {
                    let _ = reply.send(self.stats());
                }
                Command::Terminate(reply) => {
                    let _ = reply.send(());
                }
            }
        }

        let queued = self.queue.len();
        let running = self.in_flight.len();

        for task in self.queue.drain(..) {
            task.fail(TaskError::Shutdown);
        }
        for (_, task) in self.in_flight.drain() {
            task.cancel.cancel();
            let _ = task.events.send(TaskEvent::Failed(TaskError::Shutdown));
        }

        self.busy.clear();
        self.idle.clear();
        // Dropping the assignment senders ends each unit's loop.
        self.units.clear();

        log::info!("Worker pool terminated ({queued} queued, {running} in flight)");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    use super::*;

    /// Jobs for the test executor.
    enum TestJob {
        /// Blocks until the sender is used or dropped, then returns the id.
        Gated(u32, std_mpsc::Receiver<()>),
        /// Sleeps briefly while tracking concurrency.
        Sleep(u32),
        /// Reports progress steps, then returns the id.
        Steps(u32, u32),
        /// Panics.
        Crash,
        /// Returns an error.
        Fail,
        /// Spins until cancelled.
        UntilCancelled,
        /// Returns how many jobs this unit ran before.
        CountRuns,
    }

    #[derive(Default)]
    struct TestExecutor {
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    impl JobExecutor for Arc<TestExecutor> {
        type Job = TestJob;
        type Output = u32;
        type UnitState = u32;

        fn execute(
            &self,
            state: &mut u32,
            job: TestJob,
            ctx: &JobContext,
        ) -> Result<u32, JobError> {
            *state += 1;
            match job {
                TestJob::Gated(id, gate) => {
                    let _ = gate.recv();
                    Ok(id)
                }
                TestJob::Sleep(id) => {
                    let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
                    self.max_running.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    self.running.fetch_sub(1, Ordering::SeqCst);
                    Ok(id)
                }
                TestJob::Steps(id, steps) => {
                    for step in 1..=steps {
                        ctx.report(f64::from(step) / f64::from(steps), &format!("step {step}"));
                    }
                    Ok(id)
                }
                TestJob::Crash => panic!("unit exploded"),
                TestJob::Fail => Err(JobError::Failed {
                    message: "bad input".to_string(),
                }),
                TestJob::UntilCancelled => loop {
                    ctx.checkpoint()?;
                    std::thread::sleep(Duration::from_millis(5));
                },
                TestJob::CountRuns => Ok(*state),
            }
        }
    }

    fn pool(size: usize) -> (WorkerPool<Arc<TestExecutor>>, Arc<TestExecutor>) {
        let executor = Arc::new(TestExecutor::default());
        (WorkerPool::with_size(Arc::clone(&executor), size), executor)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn five_jobs_on_two_units_dispatch_two_and_queue_three() {
        let (pool, _) = pool(2);
        let mut gates = Vec::new();
        let mut handles = Vec::new();
        for id in 0..5 {
            let (tx, rx) = std_mpsc::channel();
            gates.push(tx);
            handles.push(pool.submit(TestJob::Gated(id, rx)).unwrap());
        }

        let stats = pool.stats().await.unwrap();
        assert_eq!(
            stats,
            PoolStats {
                size: 2,
                idle: 0,
                busy: 2,
                queued: 3
            }
        );

        for (i, handle) in handles.iter_mut().enumerate() {
            let event = handle.next_event().await.unwrap();
            if i < 2 {
                assert!(matches!(event, TaskEvent::Dispatched { .. }), "task {i}");
            } else {
                assert_eq!(event, TaskEvent::Queued { position: i - 1 });
            }
        }

        let mut handles: VecDeque<_> = handles.into();
        for finished in 0..5u32 {
            gates[finished as usize].send(()).unwrap();
            let handle = handles.pop_front().unwrap();
            assert_eq!(handle.wait().await, Ok(finished));

            // Round-trip through the coordinator so the follow-up dispatch
            // has been processed.
            let stats = pool.stats().await.unwrap();
            let remaining_queued = 3usize.saturating_sub(finished as usize + 1);
            assert_eq!(stats.queued, remaining_queued);

            // Completing task k frees a unit for task k + 2, the queue head.
            // Every other remaining task sees no new event.
            for (offset, handle) in handles.iter_mut().enumerate() {
                let idx = finished as usize + 1 + offset;
                if idx == finished as usize + 2 {
                    assert!(
                        matches!(
                            handle.try_next_event(),
                            Some(TaskEvent::Dispatched { .. })
                        ),
                        "task {idx}"
                    );
                } else {
                    assert!(handle.try_next_event().is_none(), "task {idx}");
                }
            }
        }

        let stats = pool.stats().await.unwrap();
        assert_eq!(stats.idle, 2);
        assert_eq!(stats.busy, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn never_runs_more_jobs_than_units() {
        let (pool, executor) = pool(2);
        let handles: Vec<_> = (0..8)
            .map(|id| pool.submit(TestJob::Sleep(id)).unwrap())
            .collect();

        for (id, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.wait().await, Ok(u32::try_from(id).unwrap()));
        }
        assert!(executor.max_running.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn progress_precedes_terminal_event() {
        let (pool, _) = pool(1);
        let mut handle = pool.submit(TestJob::Steps(7, 4)).unwrap();

        let mut fractions = Vec::new();
        let mut terminal = None;
        while let Some(event) = handle.next_event().await {
            match event {
                TaskEvent::Progress { fraction, .. } => {
                    assert!(terminal.is_none());
                    fractions.push(fraction);
                }
                event if event.is_terminal() => terminal = Some(event),
                _ => {}
            }
        }

        assert_eq!(terminal, Some(TaskEvent::Completed(7)));
        assert_eq!(fractions, vec![0.25, 0.5, 0.75, 1.0]);
    }

    #[tokio::test]
    async fn job_error_fails_only_that_task() {
        let (pool, _) = pool(1);
        let failing = pool.submit(TestJob::Fail).unwrap();
        let ok = pool.submit(TestJob::Steps(3, 1)).unwrap();

        assert_eq!(
            failing.wait().await,
            Err(TaskError::Failed {
                message: "bad input".to_string()
            })
        );
        assert_eq!(ok.wait().await, Ok(3));
    }

    #[tokio::test]
    async fn crashed_unit_is_recreated_with_fresh_state() {
        let (pool, _) = pool(1);
        assert_eq!(pool.submit(TestJob::CountRuns).unwrap().wait().await, Ok(1));
        assert_eq!(pool.submit(TestJob::CountRuns).unwrap().wait().await, Ok(2));

        let crashed = pool.submit(TestJob::Crash).unwrap().wait().await;
        assert!(matches!(crashed, Err(TaskError::Crashed { message }) if message.contains("exploded")));

        let stats = pool.stats().await.unwrap();
        assert_eq!(stats.idle, 1);
        assert_eq!(pool.submit(TestJob::CountRuns).unwrap().wait().await, Ok(1));
    }

    #[tokio::test]
    async fn cancelling_queued_task_never_runs_it() {
        let (pool, _) = pool(1);
        let (gate, rx) = std_mpsc::channel();
        let running = pool.submit(TestJob::Gated(1, rx)).unwrap();
        let queued = pool.submit(TestJob::Steps(2, 1)).unwrap();

        queued.cancel();
        assert_eq!(queued.wait().await, Err(TaskError::Cancelled));

        gate.send(()).unwrap();
        assert_eq!(running.wait().await, Ok(1));
        assert_eq!(pool.stats().await.unwrap().queued, 0);
    }

    #[tokio::test]
    async fn cancelling_middle_of_queue_keeps_fifo_order() {
        let (pool, _) = pool(1);
        let mut gates = Vec::new();
        let mut handles = Vec::new();
        for id in 0..4 {
            let (tx, rx) = std_mpsc::channel();
            gates.push(tx);
            handles.push(pool.submit(TestJob::Gated(id, rx)).unwrap());
        }
        let mut handles: VecDeque<_> = handles.into();
        for (i, handle) in handles.iter_mut().enumerate() {
            let event = handle.next_event().await.unwrap();
            if i == 0 {
                assert_eq!(event, TaskEvent::Dispatched { unit: 0 });
            } else {
                assert_eq!(event, TaskEvent::Queued { position: i });
            }
        }

        let mut cancelled = handles.remove(2).unwrap();
        cancelled.cancel();
        let mut events = Vec::new();
        while let Some(event) = cancelled.next_event().await {
            events.push(event);
        }
        assert_eq!(events, vec![TaskEvent::Failed(TaskError::Cancelled)]);
        assert_eq!(pool.stats().await.unwrap().queued, 2);

        // Tasks 0, 1 and 3 remain; each completion dispatches the next one.
        for id in [0u32, 1, 3] {
            gates[id as usize].send(()).unwrap();
            let handle = handles.pop_front().unwrap();
            assert_eq!(handle.wait().await, Ok(id));

            pool.stats().await.unwrap();
            for (offset, handle) in handles.iter_mut().enumerate() {
                if offset == 0 {
                    assert_eq!(handle.try_next_event(), Some(TaskEvent::Dispatched { unit: 0 }));
                } else {
                    assert!(handle.try_next_event().is_none());
                }
            }
        }

        let stats = pool.stats().await.unwrap();
        assert_eq!((stats.idle, stats.queued), (1, 0));
    }

    #[tokio::test]
    async fn cancelling_running_task_stops_at_checkpoint() {
        let (pool, _) = pool(1);
        let mut handle = pool.submit(TestJob::UntilCancelled).unwrap();
        assert!(matches!(
            handle.next_event().await,
            Some(TaskEvent::Dispatched { unit: 0 })
        ));

        handle.cancel();
        assert_eq!(handle.wait().await, Err(TaskError::Cancelled));
        assert_eq!(pool.stats().await.unwrap().idle, 1);
    }

    #[tokio::test]
    async fn terminate_fails_pending_work_and_rejects_submissions() {
        let (pool, _) = pool(1);
        let (gate, rx) = std_mpsc::channel::<()>();
        let running = pool.submit(TestJob::Gated(1, rx)).unwrap();
        let queued_a = pool.submit(TestJob::Steps(2, 1)).unwrap();
        let queued_b = pool.submit(TestJob::Steps(3, 1)).unwrap();

        pool.terminate().await;

        assert_eq!(running.wait().await, Err(TaskError::Shutdown));
        assert_eq!(queued_a.wait().await, Err(TaskError::Shutdown));
        assert_eq!(queued_b.wait().await, Err(TaskError::Shutdown));
        assert!(matches!(
            pool.submit(TestJob::Steps(4, 1)),
            Err(SchedulerError::Terminated)
        ));
        assert_eq!(pool.stats().await, Err(SchedulerError::Terminated));

        // Second terminate is a no-op.
        pool.terminate().await;
        drop(gate);
    }

    #[test]
    fn resolved_size_is_bounded() {
        assert_eq!(PoolConfig { size: 0 }.resolved_size(), 1);
        let hardware = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        assert!(PoolConfig { size: 1024 }.resolved_size() <= hardware);
        assert!(PoolConfig::default().resolved_size() <= DEFAULT_POOL_SIZE);
    }
}
