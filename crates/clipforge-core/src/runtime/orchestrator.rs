use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::runtime::executor::StageExecutor;
use crate::runtime::pipeline::Pipeline;
use crate::runtime::storage::{TaskStore, TaskView};
use crate::runtime::types::{RuntimeError, StageFailure, TaskId};

/// Commands sent to the orchestrator's internal event loop.
#[derive(Debug)]
pub enum OrchestratorCommand {
    /// Submit a planned pipeline for execution.
    Submit {
        pipeline: Pipeline,
        /// Channel used to return the allocated `TaskId` to the caller.
        reply_tx: oneshot::Sender<TaskId>,
    },
    /// Request best-effort cancellation of a task.
    Cancel { task_id: TaskId },
}

/// The task runner.
///
/// Accepts pipeline submissions over a bounded queue, drives each task's
/// stage-by-stage state machine on its own tokio task, and records every
/// transition in the injected [`TaskStore`]. Heavy stages are gated by a
/// worker-slot semaphore so at most `max_active` tasks run tools at once;
/// the rest wait in `pending`.
///
/// # Usage
///
/// ```rust,ignore
/// let store = TaskStore::new();
/// let orchestrator = Orchestrator::start(executor, store.clone(), 64, 2);
/// let task_id = orchestrator.submit(Pipeline::plan(&request)?).await?;
/// ```
#[derive(Clone)]
pub struct Orchestrator {
    store: TaskStore,
    submit_tx: mpsc::Sender<OrchestratorCommand>,
}

impl Orchestrator {
    /// Start the orchestrator: spawns the command-dispatch loop and returns
    /// a cheap-to-clone handle. Everything it needs is passed in, so tests
    /// run it against mock tools and a private store.
    pub fn start(
        executor: StageExecutor,
        store: TaskStore,
        queue_capacity: usize,
        max_active: usize,
    ) -> Self {
        let (submit_tx, submit_rx) = mpsc::channel::<OrchestratorCommand>(queue_capacity.max(1));
        let executor = Arc::new(executor);
        let slots = Arc::new(Semaphore::new(max_active.max(1)));

        let loop_store = store.clone();
        tokio::spawn(async move {
            Self::run_loop(submit_rx, loop_store, executor, slots).await;
        });

        Orchestrator { store, submit_tx }
    }

    /// Internal event loop: receives commands and spawns task runners.
    async fn run_loop(
        mut rx: mpsc::Receiver<OrchestratorCommand>,
        store: TaskStore,
        executor: Arc<StageExecutor>,
        slots: Arc<Semaphore>,
    ) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                OrchestratorCommand::Submit { pipeline, reply_tx } => {
                    let task_id = store.create().await;
                    let _ = reply_tx.send(task_id);

                    let task_store = store.clone();
                    let task_executor = Arc::clone(&executor);
                    let task_slots = Arc::clone(&slots);
                    tokio::spawn(async move {
                        Self::execute_task(task_id, pipeline, task_store, task_executor, task_slots)
                            .await;
                    });
                }

                OrchestratorCommand::Cancel { task_id } => {
                    if store.cancel_signal(&task_id).await {
                        info!(%task_id, "cancellation requested");
                    } else {
                        warn!(%task_id, "cancel: task not found");
                    }
                }
            }
        }
    }

    /// Drive a single task through all of its stages.
    ///
    /// Exactly one terminal write happens per task: either `complete` after
    /// the last stage or `fail` at the first stage error or observed
    /// cancellation. The store's terminal guard absorbs anything racing in
    /// afterwards.
    async fn execute_task(
        task_id: TaskId,
        pipeline: Pipeline,
        store: TaskStore,
        executor: Arc<StageExecutor>,
        slots: Arc<Semaphore>,
    ) {
        // Task stays `pending` until a worker slot frees up.
        let _slot = match Arc::clone(&slots).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        let Some(cancel_rx) = store.cancel_receiver(&task_id).await else {
            return;
        };

        let mut ctx = executor.context_for(&task_id, &pipeline);
        let total = pipeline.stages.len();

        for (idx, stage) in pipeline.stages.iter().enumerate() {
            if *cancel_rx.borrow() {
                info!(%task_id, stage = stage.name(), "task cancelled before stage");
                store
                    .fail(&task_id, StageFailure::cancelled(stage.name()))
                    .await;
                return;
            }

            store.begin_stage(&task_id, stage.name()).await;
            debug!(%task_id, stage = stage.name(), "stage started");

            match executor.execute(stage, &ctx).await {
                Ok(artifact) => {
                    debug!(
                        %task_id,
                        stage = stage.name(),
                        path = %artifact.path.display(),
                        "stage finished"
                    );
                    ctx.absorb(artifact);
                    store.finish_stage(&task_id, idx + 1, total).await;
                }
                Err(failure) => {
                    warn!(%task_id, %failure, "stage failed; abandoning task");
                    store.fail(&task_id, failure).await;
                    return;
                }
            }
        }

        match ctx.final_artifact().cloned() {
            Some(artifact) => {
                info!(%task_id, result = %artifact.path.display(), "task completed");
                store.complete(&task_id, artifact).await;
                // Only after the terminal write: drop intermediates nobody
                // can reference anymore. Failed tasks keep everything for
                // diagnosis.
                for stale in ctx.superseded_media() {
                    if tokio::fs::remove_file(&stale).await.is_ok() {
                        debug!(%task_id, path = %stale.display(), "removed superseded artifact");
                    }
                }
            }
            None => {
                // Plans are non-empty by construction, so every completed
                // loop produced at least one artifact.
                store
                    .fail(
                        &task_id,
                        StageFailure::invalid("pipeline", "plan produced no artifact"),
                    )
                    .await;
            }
        }
    }

    // ── Public API ───────────────────────────────────────────────────────────

    /// Submit a pipeline for execution.
    ///
    /// Returns a [`TaskId`] immediately; execution happens in the
    /// background. [`RuntimeError::QueueFull`] when the submission queue is
    /// saturated.
    pub async fn submit(&self, pipeline: Pipeline) -> Result<TaskId, RuntimeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit_tx
            .try_send(OrchestratorCommand::Submit { pipeline, reply_tx })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => RuntimeError::QueueFull {
                    capacity: self.submit_tx.max_capacity(),
                },
                mpsc::error::TrySendError::Closed(_) => RuntimeError::Shutdown,
            })?;

        reply_rx.await.map_err(|_| RuntimeError::Shutdown)
    }

    /// Request best-effort cancellation; observed at the next stage
    /// boundary. Send errors are ignored (the task may already be done).
    pub fn cancel(&self, task_id: TaskId) {
        let _ = self
            .submit_tx
            .try_send(OrchestratorCommand::Cancel { task_id });
    }

    /// Snapshot of the task's current state.
    pub async fn status(&self, task_id: &TaskId) -> Result<TaskView, RuntimeError> {
        self.store
            .get(task_id)
            .await
            .ok_or(RuntimeError::TaskNotFound { task_id: *task_id })
    }

    /// Snapshot of every known task, newest first.
    pub async fn list(&self) -> Vec<TaskView> {
        self.store.list().await
    }

    /// Poll `status` until the task reaches a terminal state. Used by the
    /// CLI, which blocks on completion instead of handing out task ids.
    pub async fn wait(&self, task_id: &TaskId, poll: Duration) -> Result<TaskView, RuntimeError> {
        loop {
            let view = self.status(task_id).await?;
            if view.status.is_terminal() {
                return Ok(view);
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// The underlying store, for callers that read task state directly.
    pub fn store(&self) -> &TaskStore {
        &self.store
    }
}
