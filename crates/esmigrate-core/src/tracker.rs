//! Reindex task tracking.
//!
//! A launched task is polled until the cluster reports it finished or the
//! estimated ceiling is reached:
//!
//! ```text
//! Launched -> Polling -> Completed
//!                     -> Failed     (cluster-reported error, or status unreachable)
//!                     -> TimedOut   (ceiling reached; the task keeps running)
//! ```
//!
//! Elapsed time is the number of sleeps times the poll interval, so it never
//! drifts from the ceiling by more than one interval.

use std::sync::Arc;
use std::time::Duration;

use esmigrate_client::{Cluster, SubTaskStatus};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::{MigrationError, Result};

/// Task filter for the detailed task list.
pub const REINDEX_ACTIONS: &str = "*reindex";

/// Smallest poll interval honoured.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// State of a tracked task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Task id received, not yet polled.
    Launched,
    /// Status is being polled.
    Polling,
    /// The task finished without error.
    Completed,
    /// The task finished with an error, or its status could not be read.
    Failed,
    /// The ceiling was reached before the task finished.
    TimedOut,
}

impl TaskState {
    /// Whether no further polling happens in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::TimedOut
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Launched => write!(f, "launched"),
            TaskState::Polling => write!(f, "polling"),
            TaskState::Completed => write!(f, "completed"),
            TaskState::Failed => write!(f, "failed"),
            TaskState::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// Aggregate progress across the slices of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Number of slices found.
    pub sub_tasks: usize,
    /// Documents created across slices.
    pub created: u64,
    /// Documents to process across slices.
    pub total: u64,
}

impl ProgressSnapshot {
    /// Percentage complete, if the total is known.
    pub fn percent_complete(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some((self.created as f64 / self.total as f64) * 100.0)
    }

    /// Fold one slice into the aggregate. Counts saturate instead of overflowing.
    pub fn add_slice(&mut self, status: SubTaskStatus) {
        self.sub_tasks += 1;
        self.created = self.created.saturating_add(status.created);
        self.total = self.total.saturating_add(status.total);
    }
}

/// A reindex task as observed by the tracker.
#[derive(Debug, Clone)]
pub struct ReindexTask {
    /// Opaque task id.
    pub task_id: String,
    /// Current state.
    pub state: TaskState,
    /// Status polls issued.
    pub polls: u64,
    /// Observation time accumulated in poll intervals.
    pub elapsed: Duration,
    /// Latest slice progress, if any was observed.
    pub progress: Option<ProgressSnapshot>,
    /// Error reported by the cluster.
    pub error: Option<Value>,
    /// Final response reported by the cluster.
    pub response: Option<Value>,
}

impl ReindexTask {
    /// A freshly launched task.
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            state: TaskState::Launched,
            polls: 0,
            elapsed: Duration::ZERO,
            progress: None,
            error: None,
            response: None,
        }
    }

    fn complete(&mut self, response: Option<Value>) {
        self.state = TaskState::Completed;
        self.response = response;
    }

    fn fail(&mut self, error: Option<Value>) {
        self.state = TaskState::Failed;
        self.error = error;
    }

    fn time_out(&mut self) {
        self.state = TaskState::TimedOut;
    }
}

/// Polls a task until it reaches a terminal state.
pub struct TaskTracker {
    cluster: Arc<dyn Cluster>,
    clock: Arc<dyn Clock>,
    actions: String,
}

impl TaskTracker {
    /// Create a new tracker.
    pub fn new(cluster: Arc<dyn Cluster>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cluster,
            clock,
            actions: REINDEX_ACTIONS.to_string(),
        }
    }

    /// Set the action pattern used to list slices.
    pub fn with_actions(mut self, actions: impl Into<String>) -> Self {
        self.actions = actions.into();
        self
    }

    /// Track `task_id` to completion, failure or timeout.
    pub async fn track(
        &self,
        task_id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<ReindexTask> {
        let mut task = ReindexTask::new(task_id);
        self.run(&mut task, timeout, poll_interval).await?;
        Ok(task)
    }

    /// Drive `task` until it is terminal. `task` reflects the final state even
    /// when an error is returned.
    pub async fn run(
        &self,
        task: &mut ReindexTask,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<()> {
        let interval = poll_interval.max(MIN_POLL_INTERVAL);
        task.state = TaskState::Polling;

        while task.elapsed < timeout {
            task.polls += 1;
            let status = match self.cluster.task_status(&task.task_id).await {
                Ok(status) => status,
                Err(e) => {
                    error!(task_id = %task.task_id, error = %e, "task status query failed");
                    task.fail(None);
                    return Err(MigrationError::transport(
                        format!("query status of task {}", task.task_id),
                        e,
                    ));
                }
            };

            if status.completed {
                if let Some(err) = status.error {
                    error!(task_id = %task.task_id, error = %err, "task failed");
                    task.fail(Some(err.clone()));
                    return Err(MigrationError::TaskFailed {
                        task_id: task.task_id.clone(),
                        error: err,
                    });
                }
                info!(
                    task_id = %task.task_id,
                    polls = task.polls,
                    elapsed_secs = task.elapsed.as_secs(),
                    "task completed"
                );
                task.complete(status.response);
                return Ok(());
            }

            info!(task_id = %task.task_id, elapsed_secs = task.elapsed.as_secs(), "task running");
            if let Some(progress) = self.subtask_progress(&task.task_id).await {
                task.progress = Some(progress);
            }

            self.clock.sleep(interval).await;
            task.elapsed += interval;
        }

        error!(
            task_id = %task.task_id,
            timeout_secs = timeout.as_secs(),
            "task did not complete in time, leaving it running"
        );
        task.time_out();
        Err(MigrationError::Timeout {
            task_id: task.task_id.clone(),
            timeout,
        })
    }

    /// Sum the progress of all slices of `parent_task_id`.
    ///
    /// Best effort: failures are logged and yield `None`, as does a task that
    /// has no slices (not split yet, or already finished).
    pub async fn subtask_progress(&self, parent_task_id: &str) -> Option<ProgressSnapshot> {
        let list = match self.cluster.list_tasks(&self.actions).await {
            Ok(list) => list,
            Err(e) => {
                warn!(task_id = %parent_task_id, error = %e, "slice status query failed");
                return None;
            }
        };

        let mut snapshot = ProgressSnapshot {
            sub_tasks: 0,
            created: 0,
            total: 0,
        };
        for (sub_task_id, info) in list.children_of(parent_task_id) {
            let status = info.status.unwrap_or_default();
            debug!(sub_task_id, created = status.created, total = status.total, "slice progress");
            snapshot.add_slice(status);
        }

        if snapshot.sub_tasks == 0 {
            info!(task_id = %parent_task_id, "no slices found yet (not split, or already done)");
            return None;
        }
        info!(
            task_id = %parent_task_id,
            slices = snapshot.sub_tasks,
            created = snapshot.created,
            total = snapshot.total,
            "aggregate progress"
        );
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ErrorKind;
    use esmigrate_client::{MemoryCluster, Operation, ReindexRequest, TaskScript};
    use serde_json::json;

    struct Fixture {
        cluster: Arc<MemoryCluster>,
        clock: Arc<ManualClock>,
        tracker: TaskTracker,
        task_id: String,
    }

    async fn launch(cluster: MemoryCluster, slices: u32) -> Fixture {
        let cluster = Arc::new(cluster.with_index("src", 1_000));
        let clock = Arc::new(ManualClock::new());
        let task_id = cluster
            .start_reindex(&ReindexRequest {
                source: "src".into(),
                dest: "dst".into(),
                slices,
                request_timeout: Duration::from_secs(60),
            })
            .await
            .unwrap();
        let tracker = TaskTracker::new(cluster.clone(), clock.clone());
        Fixture {
            cluster,
            clock,
            tracker,
            task_id,
        }
    }

    #[tokio::test]
    async fn test_completes() {
        let f = launch(MemoryCluster::new().with_task_script(TaskScript::completes_after(3)), 4).await;

        let task = f
            .tracker
            .track(&f.task_id, Duration::from_secs(300), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(task.state, TaskState::Completed);
        assert_eq!(task.polls, 4);
        assert_eq!(task.elapsed, Duration::from_secs(15));
        assert_eq!(f.clock.sleeps().len(), 3);
        let progress = task.progress.unwrap();
        assert_eq!(progress.sub_tasks, 4);
        assert_eq!(progress.total, 1_000);
        assert!(progress.created < progress.total);
        assert_eq!(f.cluster.doc_count("dst"), Some(1_000));
    }

    #[tokio::test]
    async fn test_fails_with_cluster_error() {
        let error = json!({ "type": "es_rejected_execution_exception" });
        let f = launch(
            MemoryCluster::new().with_task_script(TaskScript::fails_after(1, error.clone())),
            1,
        )
        .await;

        let mut task = ReindexTask::new(&f.task_id);
        let err = f
            .tracker
            .run(&mut task, Duration::from_secs(300), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TaskFailed);
        assert_eq!(task.state, TaskState::Failed);
        assert_eq!(task.error, Some(error));
        assert_eq!(task.polls, 2);
    }

    #[tokio::test]
    async fn test_times_out_after_ceil_polls() {
        let f = launch(MemoryCluster::new().with_task_script(TaskScript::never_completes()), 1).await;

        let mut task = ReindexTask::new(&f.task_id);
        let err = f
            .tracker
            .run(&mut task, Duration::from_secs(7), Duration::from_secs(3))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(task.state, TaskState::TimedOut);
        // ceil(7 / 3) = 3
        assert_eq!(task.polls, 3);
        assert_eq!(f.clock.elapsed(), Duration::from_secs(9));
        assert_eq!(f.cluster.calls_of(Operation::TaskStatus).len(), 3);
    }

    #[tokio::test]
    async fn test_status_transport_failure_is_terminal() {
        let f = launch(MemoryCluster::new().with_task_script(TaskScript::never_completes()), 1).await;
        f.cluster.inject_fault(Operation::TaskStatus);

        let mut task = ReindexTask::new(&f.task_id);
        let err = f
            .tracker
            .run(&mut task, Duration::from_secs(300), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(task.state, TaskState::Failed);
        assert_eq!(task.polls, 1);
        assert!(f.clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_progress_failure_does_not_affect_verdict() {
        let f = launch(
            MemoryCluster::new()
                .with_task_script(TaskScript::completes_after(2))
                .with_fault(Operation::ListTasks),
            8,
        )
        .await;

        let task = f
            .tracker
            .track(&f.task_id, Duration::from_secs(60), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(task.state, TaskState::Completed);
        assert!(task.progress.is_none());
    }

    #[tokio::test]
    async fn test_unsliced_task_reports_no_progress() {
        let f = launch(MemoryCluster::new().with_task_script(TaskScript::never_completes()), 1).await;
        assert!(f.tracker.subtask_progress(&f.task_id).await.is_none());
    }

    #[test]
    fn test_progress_percent() {
        let snapshot = ProgressSnapshot {
            sub_tasks: 2,
            created: 25,
            total: 100,
        };
        assert_eq!(snapshot.percent_complete(), Some(25.0));
        let empty = ProgressSnapshot {
            sub_tasks: 1,
            created: 0,
            total: 0,
        };
        assert_eq!(empty.percent_complete(), None);
    }

    #[test]
    fn test_slice_counts_saturate() {
        let mut snapshot = ProgressSnapshot {
            sub_tasks: 0,
            created: 0,
            total: 0,
        };
        snapshot.add_slice(SubTaskStatus { created: 10, total: 20 });
        snapshot.add_slice(SubTaskStatus { created: u64::MAX, total: u64::MAX });
        assert_eq!(snapshot.sub_tasks, 2);
        assert_eq!(snapshot.created, u64::MAX);
        assert_eq!(snapshot.total, u64::MAX);
        assert_eq!(snapshot.percent_complete(), Some(100.0));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TaskState::Launched.is_terminal());
        assert!(!TaskState::Polling.is_terminal());
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::TimedOut.is_terminal());
        assert_eq!(TaskState::TimedOut.to_string(), "timed_out");
    }
}
