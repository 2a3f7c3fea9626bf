use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, watch};
use tracing::debug;

use crate::runtime::types::{Artifact, StageFailure, TaskId, TaskStatus};

/// The complete in-memory record for a single submitted task.
#[derive(Debug)]
struct TaskRecord {
    status: TaskStatus,
    /// Name of the current (or last attempted) stage.
    stage: Option<String>,
    /// Completed-stage fraction as a percentage. Never decreases.
    progress: u8,
    result: Option<Artifact>,
    error: Option<StageFailure>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Cancellation flag shared with the task's execution loop.
    cancel_tx: Arc<watch::Sender<bool>>,
}

impl TaskRecord {
    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// An owned snapshot of a task, safe to hold across await points and to
/// serialize for API clients.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskView {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub stage: Option<String>,
    pub progress: u8,
    pub result: Option<Artifact>,
    pub error: Option<StageFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Process-wide task table.
///
/// A `tokio::sync::RwLock<HashMap>` so many pollers can read concurrently
/// while the single runner per task writes. All lifecycle invariants are
/// enforced here rather than by caller discipline:
///
/// - terminal states absorb: every mutator is a no-op once the task is
///   `Completed` or `Failed`;
/// - `result` is only ever set by [`complete`](TaskStore::complete) and
///   `error` only by [`fail`](TaskStore::fail), so a terminal record carries
///   exactly one of the two;
/// - `updated_at` moves only when a mutation is actually applied, so polls
///   after the terminal write return identical snapshots.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    inner: Arc<RwLock<HashMap<TaskId, TaskRecord>>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id and insert a `Pending` record.
    pub async fn create(&self) -> TaskId {
        let task_id = uuid::Uuid::new_v4();
        let (cancel_tx, _cancel_rx) = watch::channel(false);
        let now = Utc::now();

        let record = TaskRecord {
            status: TaskStatus::Pending,
            stage: None,
            progress: 0,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            cancel_tx: Arc::new(cancel_tx),
        };

        self.inner.write().await.insert(task_id, record);
        task_id
    }

    /// Snapshot one task.
    pub async fn get(&self, task_id: &TaskId) -> Option<TaskView> {
        let guard = self.inner.read().await;
        guard.get(task_id).map(|r| Self::view(task_id, r))
    }

    /// Snapshot every task, newest first.
    pub async fn list(&self) -> Vec<TaskView> {
        let guard = self.inner.read().await;
        let mut views: Vec<TaskView> = guard
            .iter()
            .map(|(id, record)| Self::view(id, record))
            .collect();
        views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        views
    }

    /// Mark the task running inside the named stage.
    pub async fn begin_stage(&self, task_id: &TaskId, stage: &str) {
        self.mutate(task_id, |record| {
            record.status = TaskStatus::Running;
            record.stage = Some(stage.to_owned());
        })
        .await;
    }

    /// Record stage completion: progress becomes `done / total` as a
    /// percentage. Regressions are ignored to keep progress monotonic.
    pub async fn finish_stage(&self, task_id: &TaskId, done: usize, total: usize) {
        let percent = if total == 0 {
            100
        } else {
            ((done * 100) / total).min(100) as u8
        };
        self.mutate(task_id, |record| {
            if percent > record.progress {
                record.progress = percent;
            }
        })
        .await;
    }

    /// Terminal success. Sets the result artifact and full progress.
    pub async fn complete(&self, task_id: &TaskId, artifact: Artifact) {
        self.mutate(task_id, |record| {
            record.status = TaskStatus::Completed;
            record.progress = 100;
            record.result = Some(artifact);
        })
        .await;
    }

    /// Terminal failure. Sets the failure and keeps the stage name that
    /// produced it.
    pub async fn fail(&self, task_id: &TaskId, failure: StageFailure) {
        self.mutate(task_id, |record| {
            record.status = TaskStatus::Failed;
            record.stage = Some(failure.stage.clone());
            record.error = Some(failure);
        })
        .await;
    }

    /// Raise the cancellation flag. Returns `false` for unknown tasks.
    /// The flag is only observed at stage boundaries.
    pub async fn cancel_signal(&self, task_id: &TaskId) -> bool {
        let guard = self.inner.read().await;
        match guard.get(task_id) {
            Some(record) => {
                let _ = record.cancel_tx.send(true);
                true
            }
            None => false,
        }
    }

    /// Receiver side of the cancellation flag for the task's runner.
    pub async fn cancel_receiver(&self, task_id: &TaskId) -> Option<watch::Receiver<bool>> {
        let guard = self.inner.read().await;
        guard.get(task_id).map(|r| r.cancel_tx.subscribe())
    }

    /// Apply `apply` under the write lock unless the task is already
    /// terminal. Late writes (e.g. a cancel racing a completion) are dropped
    /// here, which is what makes the terminal state immutable.
    async fn mutate<F>(&self, task_id: &TaskId, apply: F)
    where
        F: FnOnce(&mut TaskRecord),
    {
        let mut guard = self.inner.write().await;
        let Some(record) = guard.get_mut(task_id) else {
            debug!(%task_id, "mutation for unknown task dropped");
            return;
        };
        if record.status.is_terminal() {
            debug!(%task_id, status = record.status.as_str(), "mutation after terminal state dropped");
            return;
        }
        apply(record);
        record.touch();
    }

    fn view(task_id: &TaskId, record: &TaskRecord) -> TaskView {
        TaskView {
            task_id: *task_id,
            status: record.status,
            stage: record.stage.clone(),
            progress: record.progress,
            result: record.result.clone(),
            error: record.error.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
