//! Artifact endpoints: stream, list and delete files in the output
//! directory.
//!
//! Filenames must be bare names. Anything carrying a path separator or a
//! `..` component is rejected before it touches the filesystem, so a
//! crafted name can never address files outside the output directory.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::Response;
use axum::routing::{delete, get};
use axum::{Json, Router};
use tokio_util::io::ReaderStream;
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::files::FileInfo;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(download_artifact, list_files, delete_file),
    components(schemas(FileInfo))
)]
pub struct FilesApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/download/{filename}", get(download_artifact))
        .route("/files", get(list_files))
        .route("/files/{filename}", delete(delete_file))
}

/// Resolve a client-supplied filename inside the output directory.
fn artifact_path(state: &AppState, filename: &str) -> Result<PathBuf, ServerError> {
    let bare =
        !filename.is_empty() && !filename.contains(['/', '\\']) && !filename.contains("..");
    if !bare {
        return Err(ServerError::BadRequest(format!(
            "invalid filename '{filename}'"
        )));
    }
    Ok(state.config.output_dir.join(filename))
}

/// Async existence check; anything that is not a plain file reads as 404.
async fn file_metadata(path: &PathBuf, filename: &str) -> Result<std::fs::Metadata, ServerError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => Ok(metadata),
        _ => Err(ServerError::NotFound(format!("file '{filename}' not found"))),
    }
}

fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit('.').next() {
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        Some("srt") => "application/x-subrip",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Stream a produced artifact as an attachment.
#[utoipa::path(
    get,
    path = "/download/{filename}",
    tag = "files",
    params(
        ("filename" = String, Path, description = "Bare artifact filename")
    ),
    responses(
        (status = 200, description = "Artifact bytes"),
        (status = 400, description = "Invalid filename"),
        (status = 404, description = "No such artifact"),
    )
)]
pub async fn download_artifact(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, ServerError> {
    let path = artifact_path(&state, &filename)?;
    let length = file_metadata(&path, &filename).await?.len();

    let file = tokio::fs::File::open(&path).await?;
    let stream = ReaderStream::new(file);

    let response = Response::builder()
        .header(header::CONTENT_TYPE, content_type_for(&filename))
        .header(header::CONTENT_LENGTH, length)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    Ok(response)
}

/// List artifacts in the output directory (uploads are excluded: they live
/// in a subdirectory and are inputs, not results).
#[utoipa::path(
    get,
    path = "/files",
    tag = "files",
    responses(
        (status = 200, description = "Artifacts listed", body = [FileInfo]),
    )
)]
pub async fn list_files(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FileInfo>>, ServerError> {
    let mut files = Vec::new();
    let mut dir = match tokio::fs::read_dir(&state.config.output_dir).await {
        Ok(dir) => dir,
        // No output directory yet means no artifacts yet.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Json(files)),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = dir.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let modified = metadata
            .modified()
            .ok()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339());
        files.push(FileInfo {
            name,
            size: metadata.len(),
            modified,
        });
    }

    files.sort_by(|a, b| b.modified.cmp(&a.modified));
    Ok(Json(files))
}

/// Remove one artifact.
#[utoipa::path(
    delete,
    path = "/files/{filename}",
    tag = "files",
    params(
        ("filename" = String, Path, description = "Bare artifact filename")
    ),
    responses(
        (status = 200, description = "Artifact deleted", body = serde_json::Value),
        (status = 400, description = "Invalid filename"),
        (status = 404, description = "No such artifact"),
    )
)]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let path = artifact_path(&state, &filename)?;
    file_metadata(&path, &filename).await?;

    tokio::fs::remove_file(&path).await?;
    info!(%filename, "artifact deleted");
    Ok(Json(serde_json::json!({ "deleted": filename })))
}

// ── Tests ──────────────────────────────────────────────────────────────────────
