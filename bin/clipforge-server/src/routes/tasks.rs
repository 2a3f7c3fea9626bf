//! Task tracking endpoints: list, poll, cancel.
//!
//! Polling is read-only; repeated reads of a terminal task return identical
//! payloads because the store stops touching `updated_at` after the
//! terminal write.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;
use utoipa::OpenApi;

use clipforge_core::TaskId;

use crate::error::ServerError;
use crate::schemas::task::{TaskError, TaskResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_tasks, get_task, cancel_task),
    components(schemas(TaskResponse, TaskError))
)]
pub struct TasksApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tasks/{id}", get(get_task))
        .route("/tasks/{id}/cancel", post(cancel_task))
}

/// All known tasks, newest first.
#[utoipa::path(
    get,
    path = "/tasks",
    tag = "tasks",
    responses(
        (status = 200, description = "Tasks listed", body = [TaskResponse]),
    )
)]
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<TaskResponse>> {
    let views = state.orchestrator.list().await;
    Json(views.into_iter().map(TaskResponse::from).collect())
}

/// Poll one task.
#[utoipa::path(
    get,
    path = "/tasks/{id}",
    tag = "tasks",
    params(
        ("id" = Uuid, Path, description = "Task id returned at submission")
    ),
    responses(
        (status = 200, description = "Task snapshot", body = TaskResponse),
        (status = 404, description = "Task not found"),
    )
)]
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TaskId>,
) -> Result<Json<TaskResponse>, ServerError> {
    let view = state.orchestrator.status(&id).await?;
    Ok(Json(view.into()))
}

/// Best-effort cancellation, observed at the next stage boundary.
#[utoipa::path(
    post,
    path = "/tasks/{id}/cancel",
    tag = "tasks",
    params(
        ("id" = Uuid, Path, description = "Task id to cancel")
    ),
    responses(
        (status = 200, description = "Cancellation requested", body = serde_json::Value),
        (status = 400, description = "Task already terminal"),
        (status = 404, description = "Task not found"),
    )
)]
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TaskId>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let view = state.orchestrator.status(&id).await?;
    if view.status.is_terminal() {
        return Err(ServerError::BadRequest(format!(
            "task {id} is not cancellable (status: {})",
            view.status.as_str()
        )));
    }

    state.orchestrator.cancel(id);
    info!(task_id = %id, "cancellation requested");
    Ok(Json(serde_json::json!({
        "task_id": id,
        "status": "cancelling",
    })))
}
