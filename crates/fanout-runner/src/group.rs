//! Task group: fan-out of lightweight tasks and a single join barrier.

use std::any::Any;
use std::future::{poll_fn, Future};
use std::iter::Sum;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::pin;
use std::sync::{Arc, OnceLock};
use std::task::Poll;

use fanout_core::{
    FailurePolicy, GroupId, GroupStatus, GroupSummary, TaskError, TaskId, TaskOutcome,
};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{GroupStats, RunnerConfig, RunnerError, TaskContext};

/// First failure observed in a strict group, in completion order.
type FirstFailure = Arc<OnceLock<(TaskId, TaskError)>>;

/// An explicitly scoped group of concurrent tasks.
///
/// Tasks are tokio tasks, so millions of them can be in flight on a handful
/// of worker threads. Every task receives a [`TaskContext`] sharing the
/// group's cancellation token, which is itself a child of the shutdown token. [`join`](Self::join) consumes the group
/// and returns only once every task has reached a terminal state.
///
/// Dropping a group without joining it cancels and aborts its tasks.
pub struct TaskGroup<T> {
    summary: GroupSummary,
    config: RunnerConfig,
    /// Caller-owned token; firing it interrupts the join.
    shutdown: CancellationToken,
    /// Group-owned token shared by every task.
    cancel: CancellationToken,
    limiter: Option<Arc<Semaphore>>,
    stats: Arc<GroupStats>,
    first_failure: FirstFailure,
    handles: Vec<JoinHandle<Result<T, TaskError>>>,
}

impl<T: Send + 'static> TaskGroup<T> {
    /// Create an empty group with no external shutdown signal.
    pub fn new(config: RunnerConfig) -> Result<Self, RunnerError> {
        Self::with_shutdown(config, &CancellationToken::new())
    }

    /// Create an empty group whose join is interrupted by `shutdown`.
    ///
    /// Cancelling `shutdown` also cancels every task in the group.
    pub fn with_shutdown(
        config: RunnerConfig,
        shutdown: &CancellationToken,
    ) -> Result<Self, RunnerError> {
        config.validate()?;

        let limiter = config
            .max_concurrency
            .map(|limit| Arc::new(Semaphore::new(limit)));

        Ok(Self {
            summary: GroupSummary::new(GroupId::generate(), config.policy),
            shutdown: shutdown.clone(),
            cancel: shutdown.child_token(),
            limiter,
            stats: Arc::new(GroupStats::default()),
            first_failure: Arc::new(OnceLock::new()),
            handles: Vec::new(),
            config,
        })
    }

    pub fn id(&self) -> &GroupId {
        &self.summary.group_id
    }

    pub fn policy(&self) -> FailurePolicy {
        self.config.policy
    }

    pub fn status(&self) -> GroupStatus {
        self.summary.status
    }

    /// Number of tasks submitted so far.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Shared progress counters, readable while the group runs.
    pub fn stats(&self) -> Arc<GroupStats> {
        Arc::clone(&self.stats)
    }

    /// The token shared by every task in the group.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request cooperative cancellation of every task in the group.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Submit one task. Must be called from within a tokio runtime.
    ///
    /// The returned id is the task's position in the collected results.
    pub fn spawn<F, Fut>(&mut self, task: F) -> TaskId
    where
        F: FnOnce(TaskContext) -> Fut,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        let id = TaskId::new(self.handles.len());
        let cancel = self.cancel.clone();
        let body = task(TaskContext::new(id, cancel.clone()));

        let mut guard = TaskGuard {
            id,
            stats: Arc::clone(&self.stats),
            fail_fast: self
                .config
                .policy
                .is_fail_fast()
                .then(|| (self.cancel.clone(), Arc::clone(&self.first_failure))),
            running: false,
        };
        let limiter = self.limiter.clone();

        self.stats.on_submit();
        self.summary.submitted += 1;

        let handle = tokio::spawn(async move {
            let _permit = match limiter {
                Some(semaphore) => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(TaskError::Cancelled),
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => Some(permit),
                        Err(_) => return Err(TaskError::Cancelled),
                    },
                },
                None => None,
            };

            guard.start();
            let mut body = pin!(body);
            let result = poll_fn(|cx| {
                match catch_unwind(AssertUnwindSafe(|| body.as_mut().poll(cx))) {
                    Ok(poll) => poll,
                    Err(payload) => Poll::Ready(Err(TaskError::Panicked(payload_message(
                        payload.as_ref(),
                    )))),
                }
            })
            .await;
            if let Err(err) = &result {
                if !err.is_cancellation() {
                    guard.fail(err);
                }
            }
            result
        });

        self.handles.push(handle);
        id
    }

    /// Submit `count` tasks built by `factory`; returns the number submitted.
    pub fn spawn_n<F, Fut>(&mut self, count: usize, factory: F) -> usize
    where
        F: Fn(TaskContext) -> Fut,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.handles.reserve(count);
        for _ in 0..count {
            self.spawn(&factory);
        }

        info!(
            group_id = %self.summary.group_id,
            spawned = count,
            total = self.handles.len(),
            "Spawned tasks"
        );
        count
    }

    /// Wait for every task to reach a terminal state.
    ///
    /// Under [`FailurePolicy::Strict`] the first failure cancels the rest of
    /// the group and is returned as [`RunnerError::TaskFailed`] once all tasks
    /// have been joined. Under [`FailurePolicy::Resilient`] every outcome is
    /// returned in submission order.
    ///
    /// If the join deadline passes, unfinished tasks are aborted and
    /// [`RunnerError::Timeout`] is returned. If the shutdown token fires, the
    /// group is cancelled, drained, and [`RunnerError::Interrupted`] is
    /// returned.
    pub async fn join(mut self) -> Result<GroupResults<T>, RunnerError> {
        let mut outcomes = Vec::with_capacity(self.handles.len());
        self.drain(|outcome| outcomes.push(outcome)).await?;

        Ok(GroupResults {
            summary: self.summary.clone(),
            outcomes,
        })
    }

    /// Like [`join`](Self::join), but keeps only the counts: each outcome is
    /// dropped as soon as it has been recorded in the summary.
    pub async fn join_summary(mut self) -> Result<GroupSummary, RunnerError> {
        self.drain(drop).await?;
        Ok(self.summary.clone())
    }

    async fn drain<F>(&mut self, mut sink: F) -> Result<(), RunnerError>
    where
        F: FnMut(TaskOutcome<T>),
    {
        self.summary.status = self.summary.status.advance(GroupStatus::Joining)?;

        let total = self.handles.len();
        let deadline = self.config.join_deadline.map(|d| Instant::now() + d);

        info!(
            group_id = %self.summary.group_id,
            tasks = total,
            policy = %self.config.policy,
            "Joining task group"
        );

        let mut interrupted = false;
        let mut timed_out: Option<usize> = None;
        let mut first_failed: Option<(TaskId, TaskError)> = None;

        for index in 0..total {
            let result = loop {
                let watch_shutdown = !interrupted && timed_out.is_none();
                let watch_deadline = deadline.is_some() && timed_out.is_none();
                let expiry = async move {
                    match deadline {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending().await,
                    }
                };

                let wait = tokio::select! {
                    biased;
                    res = &mut self.handles[index] => Wait::Done(res),
                    _ = self.shutdown.cancelled(), if watch_shutdown => Wait::Interrupted,
                    _ = expiry, if watch_deadline => Wait::Expired,
                };

                match wait {
                    Wait::Done(res) => break res,
                    Wait::Interrupted => {
                        interrupted = true;
                        warn!(
                            group_id = %self.summary.group_id,
                            joined = index,
                            "Join interrupted; cancelling remaining tasks"
                        );
                        self.cancel.cancel();
                    }
                    Wait::Expired => {
                        let pending = self.handles[index..]
                            .iter()
                            .filter(|handle| !handle.is_finished())
                            .count();
                        timed_out = Some(pending);
                        warn!(
                            group_id = %self.summary.group_id,
                            pending,
                            "Join deadline exceeded; aborting remaining tasks"
                        );
                        self.cancel.cancel();
                        for handle in &self.handles[index..] {
                            handle.abort();
                        }
                    }
                }
            };

            let outcome = outcome_from_join(result);
            self.summary.record(outcome.status());
            if first_failed.is_none() {
                if let Some(err) = outcome.error() {
                    first_failed = Some((TaskId::new(index), err.clone()));
                }
            }
            sink(outcome);
        }

        self.handles.clear();

        if !interrupted && self.shutdown.is_cancelled() {
            interrupted = true;
        }

        self.summary.status = self.summary.status.advance(GroupStatus::Closed)?;
        self.summary.finish();

        info!(
            group_id = %self.summary.group_id,
            completed = self.summary.completed,
            failed = self.summary.failed,
            cancelled = self.summary.cancelled,
            elapsed_ms = self.summary.elapsed_ms().unwrap_or_default(),
            "Task group closed"
        );

        if self.config.policy.is_fail_fast() {
            // Completion order wins; submission order covers failures that
            // never reached the cell, such as a panic outside the task body.
            let first = self.first_failure.get().cloned().or(first_failed);
            if let Some((task_id, source)) = first {
                return Err(RunnerError::TaskFailed { task_id, source });
            }
        }

        if let Some(pending) = timed_out {
            return Err(RunnerError::Timeout {
                deadline: self.config.join_deadline.unwrap_or_default(),
                pending,
            });
        }

        if interrupted {
            return Err(RunnerError::Interrupted {
                completed: self.summary.completed,
                cancelled: self.summary.cancelled,
            });
        }

        Ok(())
    }
}

impl<T> Drop for TaskGroup<T> {
    fn drop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        debug!(
            group_id = %self.summary.group_id,
            abandoned = self.handles.len(),
            "Task group dropped without join; aborting tasks"
        );
        self.cancel.cancel();
        for handle in &self.handles {
            handle.abort();
        }
    }
}

enum Wait<R> {
    Done(R),
    Interrupted,
    Expired,
}

/// Tracks one task's lifecycle; its drop marks the task as finished even when
/// the task is aborted.
struct TaskGuard {
    id: TaskId,
    stats: Arc<GroupStats>,
    fail_fast: Option<(CancellationToken, FirstFailure)>,
    running: bool,
}

impl TaskGuard {
    fn start(&mut self) {
        self.running = true;
        self.stats.on_start();
    }

    fn fail(&self, err: &TaskError) {
        debug!(task_id = %self.id, error = %err, "Task failed");
        if let Some((cancel, first)) = &self.fail_fast {
            if first.set((self.id, err.clone())).is_ok() {
                warn!(task_id = %self.id, error = %err, "First failure; cancelling group");
            }
            cancel.cancel();
        }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.stats.on_exit(self.running);
    }
}

fn outcome_from_join<T>(result: Result<Result<T, TaskError>, JoinError>) -> TaskOutcome<T> {
    match result {
        Ok(result) => TaskOutcome::from_result(result),
        Err(err) if err.is_cancelled() => TaskOutcome::Cancelled,
        Err(err) => TaskOutcome::Failed(TaskError::Panicked(panic_message(err))),
    }
}

fn panic_message(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => payload_message(payload.as_ref()),
        Err(err) => err.to_string(),
    }
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Ordered outcomes of a joined group.
#[derive(Debug)]
pub struct GroupResults<T> {
    summary: GroupSummary,
    outcomes: Vec<TaskOutcome<T>>,
}

impl<T> GroupResults<T> {
    pub fn summary(&self) -> &GroupSummary {
        &self.summary
    }

    /// Outcomes indexed by submission order.
    pub fn outcomes(&self) -> &[TaskOutcome<T>] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Values of completed tasks, in submission order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.outcomes.iter().filter_map(TaskOutcome::value)
    }

    /// Failed tasks with their errors, in submission order.
    pub fn failures(&self) -> impl Iterator<Item = (TaskId, &TaskError)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(index, outcome)| outcome.error().map(|err| (TaskId::new(index), err)))
    }

    pub fn into_outcomes(self) -> Vec<TaskOutcome<T>> {
        self.outcomes
    }

    /// Values of completed tasks, in submission order.
    pub fn into_values(self) -> Vec<T> {
        self.outcomes
            .into_iter()
            .filter_map(TaskOutcome::into_value)
            .collect()
    }

    /// Reduce completed values by addition; zero tasks give the identity.
    pub fn sum(&self) -> T
    where
        T: Copy + Sum<T>,
    {
        self.values().copied().sum()
    }
}
