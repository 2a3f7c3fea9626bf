//! Service index and heartbeat endpoints.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_index, get_health))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_index))
        .route("/health", get(get_health))
}

/// Service index: name, version and a map of the API surface.
#[utoipa::path(
    get,
    path = "/",
    tag = "meta",
    responses(
        (status = 200, description = "Service index", body = Value)
    )
)]
pub async fn get_index() -> Json<Value> {
    Json(json!({
        "service": "clipforge",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/swagger-ui",
        "endpoints": {
            "process": "POST /process",
            "download": "POST /download",
            "transcribe": "POST /transcribe",
            "extract_clip": "POST /extract-clip",
            "generate_random_clip": "POST /generate-random-clip",
            "add_subtitles": "POST /add-subtitles",
            "add_text_overlay": "POST /add-text-overlay",
            "crop_for_social": "POST /crop-for-social",
            "upload": "POST /upload",
            "upload_multiple": "POST /upload-multiple",
            "task_status": "GET /tasks/{id}",
            "task_list": "GET /tasks",
            "task_cancel": "POST /tasks/{id}/cancel",
            "artifact": "GET /download/{filename}",
            "artifact_list": "GET /files",
            "artifact_delete": "DELETE /files/{filename}",
        },
    }))
}

/// Heartbeat for load balancers and monitoring.
#[utoipa::path(
    get,
    path = "/health",
    tag = "meta",
    responses(
        (status = 200, description = "Server is healthy", body = Value)
    )
)]
pub async fn get_health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn health_reports_healthy_with_version() {
        let Json(body) = get_health().await;
        assert_eq!(body["status"], "healthy");
        assert!(!body["version"].as_str().unwrap_or("").is_empty());
    }

    #[tokio::test]
    async fn index_lists_the_processing_endpoints() {
        let Json(body) = get_index().await;
        assert_eq!(body["service"], "clipforge");
        assert_eq!(body["endpoints"]["process"], "POST /process");
    }
}
