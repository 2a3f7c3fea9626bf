//! Processing endpoints – asynchronous accept-and-poll pattern.
//!
//! Every handler follows the same shape: resolve the `source` string,
//! convert the DTO into a core [`ClipRequest`], plan it (validation happens
//! inside [`Pipeline::plan`]), submit to the orchestrator, and reply 202
//! with the task id. Execution happens in the background; clients poll
//! `GET /tasks/{id}`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use utoipa::OpenApi;

use clipforge_core::{ClipRequest, Pipeline};

use crate::error::ServerError;
use crate::schemas::process::{
    AddSubtitlesRequest, AddTextRequest, CropRequest, DownloadRequest, ExtractClipRequest,
    ProcessRequest, RandomClipRequest, TranscribeRequest,
};
use crate::schemas::task::TaskAccepted;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        process,
        download,
        transcribe,
        extract_clip,
        generate_random_clip,
        add_subtitles,
        add_text_overlay,
        crop_for_social
    ),
    components(schemas(
        ProcessRequest,
        DownloadRequest,
        TranscribeRequest,
        ExtractClipRequest,
        RandomClipRequest,
        AddSubtitlesRequest,
        AddTextRequest,
        CropRequest,
        TaskAccepted
    ))
)]
pub struct ProcessApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/process", post(process))
        .route("/download", post(download))
        .route("/transcribe", post(transcribe))
        .route("/extract-clip", post(extract_clip))
        .route("/generate-random-clip", post(generate_random_clip))
        .route("/add-subtitles", post(add_subtitles))
        .route("/add-text-overlay", post(add_text_overlay))
        .route("/crop-for-social", post(crop_for_social))
}

type Accepted = (StatusCode, Json<TaskAccepted>);

/// Plan and submit one request. Validation errors surface as 400 before a
/// task exists; a saturated queue surfaces as 503.
async fn submit(state: &AppState, request: ClipRequest) -> Result<Accepted, ServerError> {
    let pipeline = Pipeline::plan(&request)?;
    let task_id = state.orchestrator.submit(pipeline).await?;
    Ok((StatusCode::ACCEPTED, Json(TaskAccepted::pending(task_id))))
}

/// Full viral-clip pipeline: cut, transcribe, caption, crop, banner.
#[utoipa::path(
    post,
    path = "/process",
    tag = "processing",
    request_body = ProcessRequest,
    responses(
        (status = 202, description = "Task accepted", body = TaskAccepted),
        (status = 400, description = "Invalid request"),
        (status = 503, description = "Queue full"),
    )
)]
pub async fn process(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProcessRequest>,
) -> Result<Accepted, ServerError> {
    let source = state.resolve_source(&body.source).await?;
    submit(&state, body.into_clip_request(source)).await
}

/// Download a remote video without further processing.
#[utoipa::path(
    post,
    path = "/download",
    tag = "processing",
    request_body = DownloadRequest,
    responses(
        (status = 202, description = "Task accepted", body = TaskAccepted),
        (status = 400, description = "Invalid request"),
        (status = 503, description = "Queue full"),
    )
)]
pub async fn download(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DownloadRequest>,
) -> Result<Accepted, ServerError> {
    submit(&state, ClipRequest::download_only(body.url)).await
}

/// Produce a transcript (`srt` or `txt`) without touching the video.
#[utoipa::path(
    post,
    path = "/transcribe",
    tag = "processing",
    request_body = TranscribeRequest,
    responses(
        (status = 202, description = "Task accepted", body = TaskAccepted),
        (status = 400, description = "Invalid request"),
        (status = 503, description = "Queue full"),
    )
)]
pub async fn transcribe(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TranscribeRequest>,
) -> Result<Accepted, ServerError> {
    let source = state.resolve_source(&body.source).await?;
    submit(&state, body.into_clip_request(source)).await
}

/// Cut an explicit start/duration window out of the source.
#[utoipa::path(
    post,
    path = "/extract-clip",
    tag = "processing",
    request_body = ExtractClipRequest,
    responses(
        (status = 202, description = "Task accepted", body = TaskAccepted),
        (status = 400, description = "Invalid request"),
        (status = 503, description = "Queue full"),
    )
)]
pub async fn extract_clip(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExtractClipRequest>,
) -> Result<Accepted, ServerError> {
    let source = state.resolve_source(&body.source).await?;
    submit(&state, body.into_clip_request(source)).await
}

/// Full treatment of a randomly selected window.
#[utoipa::path(
    post,
    path = "/generate-random-clip",
    tag = "processing",
    request_body = RandomClipRequest,
    responses(
        (status = 202, description = "Task accepted", body = TaskAccepted),
        (status = 400, description = "Invalid request"),
        (status = 503, description = "Queue full"),
    )
)]
pub async fn generate_random_clip(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RandomClipRequest>,
) -> Result<Accepted, ServerError> {
    let source = state.resolve_source(&body.source).await?;
    submit(&state, body.into_clip_request(source)).await
}

/// Transcribe and burn the captions into the video.
#[utoipa::path(
    post,
    path = "/add-subtitles",
    tag = "processing",
    request_body = AddSubtitlesRequest,
    responses(
        (status = 202, description = "Task accepted", body = TaskAccepted),
        (status = 400, description = "Invalid request"),
        (status = 503, description = "Queue full"),
    )
)]
pub async fn add_subtitles(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AddSubtitlesRequest>,
) -> Result<Accepted, ServerError> {
    let source = state.resolve_source(&body.source).await?;
    submit(&state, body.into_clip_request(source)).await
}

/// Draw a static banner onto the video.
#[utoipa::path(
    post,
    path = "/add-text-overlay",
    tag = "processing",
    request_body = AddTextRequest,
    responses(
        (status = 202, description = "Task accepted", body = TaskAccepted),
        (status = 400, description = "Invalid request"),
        (status = 503, description = "Queue full"),
    )
)]
pub async fn add_text_overlay(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AddTextRequest>,
) -> Result<Accepted, ServerError> {
    let source = state.resolve_source(&body.source).await?;
    submit(&state, body.into_clip_request(source)).await
}

/// Crop to a social-media aspect ratio.
#[utoipa::path(
    post,
    path = "/crop-for-social",
    tag = "processing",
    request_body = CropRequest,
    responses(
        (status = 202, description = "Task accepted", body = TaskAccepted),
        (status = 400, description = "Invalid request"),
        (status = 503, description = "Queue full"),
    )
)]
pub async fn crop_for_social(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CropRequest>,
) -> Result<Accepted, ServerError> {
    let source = state.resolve_source(&body.source).await?;
    submit(&state, body.into_clip_request(source)).await
}
