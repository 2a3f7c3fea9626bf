//! Task DTOs returned by the accept-and-poll endpoints.

use serde::Serialize;
use utoipa::ToSchema;

use clipforge_core::{TaskId, TaskView};

/// Returned with HTTP 202 by every processing endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct TaskAccepted {
    #[schema(value_type = Uuid)]
    pub task_id: TaskId,
    pub status: String,
}

impl TaskAccepted {
    pub fn pending(task_id: TaskId) -> Self {
        TaskAccepted {
            task_id,
            status: "pending".to_owned(),
        }
    }
}

/// Failure details carried by a failed task.
#[derive(Debug, Serialize, ToSchema)]
pub struct TaskError {
    /// Stage the pipeline failed at (`download`, `extract`, ...).
    pub stage: String,
    /// One of `invalid_input`, `tool_unavailable`, `tool_execution_failed`,
    /// `io_error`, `cancelled`.
    pub category: String,
    pub detail: String,
}

/// Snapshot of a task, as returned by `GET /tasks/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TaskResponse {
    #[schema(value_type = Uuid)]
    pub task_id: TaskId,
    pub status: String,
    /// Current (or last attempted) stage while running.
    pub stage: Option<String>,
    /// Completed-stage percentage, 0-100.
    pub progress: u8,
    /// `/download/{filename}` reference, set once the task completed.
    pub result_url: Option<String>,
    pub error: Option<TaskError>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<TaskView> for TaskResponse {
    fn from(view: TaskView) -> Self {
        TaskResponse {
            task_id: view.task_id,
            status: view.status.as_str().to_owned(),
            stage: view.stage,
            progress: view.progress,
            result_url: view
                .result
                .as_ref()
                .and_then(|a| a.file_name())
                .map(|name| format!("/download/{name}")),
            error: view.error.map(|e| TaskError {
                stage: e.stage,
                category: e.kind.as_str().to_owned(),
                detail: e.detail,
            }),
            created_at: view.created_at.to_rfc3339(),
            updated_at: view.updated_at.to_rfc3339(),
        }
    }
}
