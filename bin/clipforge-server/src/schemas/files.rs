//! DTOs for upload and artifact-management endpoints.

use serde::Serialize;
use utoipa::ToSchema;

/// One stored upload, returned by `POST /upload`.
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadedFile {
    /// Accepted as a `source` value by every processing endpoint.
    pub file_id: String,
    /// Filename the client sent, kept for display only.
    pub filename: String,
    /// Stored size in bytes.
    pub size: u64,
}

/// One artifact in the output directory (`GET /files`).
#[derive(Debug, Serialize, ToSchema)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    /// RFC 3339 modification time, when the filesystem reports one.
    pub modified: Option<String>,
}
