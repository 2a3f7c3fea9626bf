//! Multipart video upload.
//!
//! Uploads land under `<output>/uploads/<uuid>.<ext>`; the returned
//! `file_id` is accepted as a `source` value by every processing endpoint.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use utoipa::OpenApi;
use uuid::Uuid;

use crate::error::ServerError;
use crate::schemas::files::UploadedFile;
use crate::state::AppState;

/// Container formats the pipeline's tools are known to handle.
const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "flv", "wmv"];

#[derive(OpenApi)]
#[openapi(
    paths(upload, upload_multiple),
    components(schemas(UploadedFile))
)]
pub struct UploadApi;

pub fn router(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(upload))
        .route("/upload-multiple", post(upload_multiple))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes()))
}

/// A field is accepted when either its content type says video or its
/// filename carries a known container extension.
fn validate_video(filename: &str, content_type: Option<&str>) -> Result<String, ServerError> {
    let extension = filename
        .rsplit('.')
        .next()
        .filter(|ext| *ext != filename)
        .map(str::to_lowercase);

    let by_type = content_type.is_some_and(|ct| ct.starts_with("video/"));
    let by_extension = extension
        .as_deref()
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext));

    if !(by_type || by_extension) {
        return Err(ServerError::BadRequest(format!(
            "'{filename}' is not a supported video file (allowed: {})",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    Ok(extension.unwrap_or_else(|| "mp4".to_owned()))
}

async fn store_field(
    state: &AppState,
    mut field: axum::extract::multipart::Field<'_>,
) -> Result<UploadedFile, ServerError> {
    let filename = field
        .file_name()
        .map(str::to_owned)
        .ok_or_else(|| ServerError::BadRequest("upload field has no filename".to_owned()))?;
    let content_type = field.content_type().map(str::to_owned);
    let extension = validate_video(&filename, content_type.as_deref())?;

    let file_id = Uuid::new_v4().to_string();
    let uploads_dir = state.config.uploads_dir();
    tokio::fs::create_dir_all(&uploads_dir).await?;
    let dest = uploads_dir.join(format!("{file_id}.{extension}"));

    // Stream the field to disk chunk by chunk; uploads can run to hundreds
    // of megabytes and must never be buffered whole.
    let mut out = tokio::fs::File::create(&dest).await?;
    let size = match copy_field(&mut field, &mut out).await {
        Ok(size) if size > 0 => size,
        outcome => {
            drop(out);
            let _ = tokio::fs::remove_file(&dest).await;
            return match outcome {
                Ok(_) => Err(ServerError::BadRequest(format!("'{filename}' is empty"))),
                Err(e) => Err(e),
            };
        }
    };
    debug!(%file_id, %filename, size, path = %dest.display(), "upload stored");

    Ok(UploadedFile {
        file_id,
        filename,
        size,
    })
}

async fn copy_field(
    field: &mut axum::extract::multipart::Field<'_>,
    out: &mut tokio::fs::File,
) -> Result<u64, ServerError> {
    let mut size = 0u64;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ServerError::BadRequest(format!("reading upload body: {e}")))?
    {
        out.write_all(&chunk).await?;
        size += chunk.len() as u64;
    }
    out.flush().await?;
    Ok(size)
}

/// Upload a single video (`multipart/form-data`, field `file`).
#[utoipa::path(
    post,
    path = "/upload",
    tag = "files",
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Upload stored", body = UploadedFile),
        (status = 400, description = "Not a supported video file"),
        (status = 413, description = "Body exceeds the upload size cap"),
    )
)]
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadedFile>, ServerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.file_name().is_none() {
            continue;
        }
        let stored = store_field(&state, field).await?;
        info!(file_id = %stored.file_id, filename = %stored.filename, "video uploaded");
        return Ok(Json(stored));
    }

    Err(ServerError::BadRequest(
        "multipart body contains no file field".to_owned(),
    ))
}

/// Upload several videos in one request; one `UploadedFile` per stored
/// field, in body order.
#[utoipa::path(
    post,
    path = "/upload-multiple",
    tag = "files",
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Uploads stored", body = [UploadedFile]),
        (status = 400, description = "A field is not a supported video file"),
        (status = 413, description = "Body exceeds the upload size cap"),
    )
)]
pub async fn upload_multiple(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Vec<UploadedFile>>, ServerError> {
    let mut stored = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.file_name().is_none() {
            continue;
        }
        stored.push(store_field(&state, field).await?);
    }

    if stored.is_empty() {
        return Err(ServerError::BadRequest(
            "multipart body contains no file fields".to_owned(),
        ));
    }

    info!(count = stored.len(), "videos uploaded");
    Ok(Json(stored))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn accepts_known_extensions_regardless_of_content_type() {
        assert_eq!(validate_video("talk.MP4", None).unwrap(), "mp4");
        assert_eq!(validate_video("talk.webm", Some("application/octet-stream")).unwrap(), "webm");
    }

    #[test]
    fn accepts_video_content_type_with_odd_extension() {
        assert_eq!(validate_video("talk.raw", Some("video/mp4")).unwrap(), "raw");
    }

    #[test]
    fn rejects_non_video_uploads() {
        assert!(validate_video("notes.pdf", Some("application/pdf")).is_err());
        assert!(validate_video("no-extension", None).is_err());
    }
}
