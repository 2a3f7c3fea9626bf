use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Unique identifier for a submitted task.
///
/// Random v4 UUIDs: opaque to callers and safe to hand out across the HTTP
/// surface (no enumerable counter).
pub type TaskId = uuid::Uuid;

/// First 8 hex chars of the task id, used to prefix artifact filenames so
/// concurrent tasks never collide in the shared output directory.
pub fn short_tag(task_id: &TaskId) -> String {
    let mut simple = task_id.simple().to_string();
    simple.truncate(8);
    simple
}

/// High-level lifecycle state of a task managed by the
/// [`Orchestrator`](crate::runtime::orchestrator::Orchestrator).
///
/// `Completed` and `Failed` are absorbing: once either is recorded the task
/// record never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Accepted but not yet started (queued or waiting for a worker slot).
    Pending,
    /// A stage is executing; the record's `stage` field names it.
    Running,
    /// Terminal success; the record carries the final artifact.
    Completed,
    /// Terminal failure; the record carries the stage failure.
    Failed,
}

impl TaskStatus {
    /// Returns `true` once the task can never change again. Pollers should
    /// use this rather than matching individual variants.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// Why a stage failed. Closed taxonomy; the category tells callers whether
/// to fix the request, fix the host, or read the tool detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The request or pipeline handed the stage something unusable.
    InvalidInput,
    /// The external tool binary is missing from the host.
    ToolUnavailable,
    /// The tool ran and reported failure (non-zero exit, bad output).
    ToolExecutionFailed,
    /// Reading or writing an artifact failed.
    IoError,
    /// The task was cancelled at a stage boundary.
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidInput => "invalid_input",
            FailureKind::ToolUnavailable => "tool_unavailable",
            FailureKind::ToolExecutionFailed => "tool_execution_failed",
            FailureKind::IoError => "io_error",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage's failure, as data. Stored on the task record and serialized to
/// API clients as `{ "stage": .., "category": .., "detail": .. }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("stage '{stage}' failed ({kind}): {detail}")]
pub struct StageFailure {
    pub stage: String,
    #[serde(rename = "category")]
    pub kind: FailureKind,
    pub detail: String,
}

impl StageFailure {
    pub fn new(stage: &str, kind: FailureKind, detail: impl Into<String>) -> Self {
        StageFailure {
            stage: stage.to_owned(),
            kind,
            detail: detail.into(),
        }
    }

    pub fn cancelled(stage: &str) -> Self {
        StageFailure::new(stage, FailureKind::Cancelled, "task cancelled")
    }

    pub fn invalid(stage: &str, detail: impl Into<String>) -> Self {
        StageFailure::new(stage, FailureKind::InvalidInput, detail)
    }
}

/// Errors produced by the runtime layer itself (not by stages).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// The submission queue is at capacity; try again later.
    #[error("submission queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The orchestrator loop is gone; the process is shutting down.
    #[error("orchestrator shut down")]
    Shutdown,

    /// The referenced task does not exist.
    #[error("task not found: {task_id}")]
    TaskNotFound { task_id: TaskId },
}

/// What kind of file a stage produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// A video (or, for download-only tasks, the fetched source).
    Media,
    /// Caption data: an `.srt` or plain-text transcript.
    Captions,
}

/// A file produced by a stage, identified by role rather than by who made it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

impl Artifact {
    pub fn media(path: PathBuf) -> Self {
        Artifact {
            path,
            kind: ArtifactKind::Media,
        }
    }

    pub fn captions(path: PathBuf) -> Self {
        Artifact {
            path,
            kind: ArtifactKind::Captions,
        }
    }

    /// Bare filename, for building `/download/{filename}` references.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}
