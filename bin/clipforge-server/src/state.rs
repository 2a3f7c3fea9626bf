//! Shared application state injected into every Axum handler.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use clipforge_core::{Orchestrator, SourceRef};

use crate::config::Config;
use crate::error::ServerError;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Handle to the task runtime.
    pub orchestrator: Orchestrator,
}

impl AppState {
    /// Turn a request's `source` string into a concrete [`SourceRef`].
    pub async fn resolve_source(&self, source: &str) -> Result<SourceRef, ServerError> {
        resolve_source(&self.config, source).await
    }
}

/// Resolution order: URL, then uploaded file id, then server-local path.
pub async fn resolve_source(config: &Config, source: &str) -> Result<SourceRef, ServerError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        return Ok(SourceRef::Url(source.to_owned()));
    }

    // Upload ids are bare UUIDs; the stored file keeps its original
    // extension, so match on the stem.
    if let Some(path) = find_upload(&config.uploads_dir(), source).await {
        debug!(source, path = %path.display(), "resolved source to uploaded file");
        return Ok(SourceRef::Local(path));
    }

    let candidate = Path::new(source);
    if let Ok(metadata) = tokio::fs::metadata(candidate).await
        && metadata.is_file()
    {
        return Ok(SourceRef::Local(candidate.to_path_buf()));
    }

    Err(ServerError::BadRequest(format!(
        "source '{source}' is not a URL, an uploaded file id, or an existing file"
    )))
}

async fn find_upload(uploads_dir: &Path, file_id: &str) -> Option<std::path::PathBuf> {
    // File ids are generated as UUIDs; refuse anything that does not parse
    // so a crafted "id" can never address arbitrary files.
    uuid::Uuid::parse_str(file_id).ok()?;

    let mut dir = tokio::fs::read_dir(uploads_dir).await.ok()?;
    while let Ok(Some(entry)) = dir.next_entry().await {
        let path = entry.path();
        if path.file_stem().and_then(|s| s.to_str()) == Some(file_id)
            && entry.file_type().await.is_ok_and(|t| t.is_file())
        {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;

    fn test_config(output_dir: PathBuf) -> Config {
        Config {
            bind_address: "127.0.0.1:0".to_owned(),
            output_dir,
            log_level: "info".to_owned(),
            log_json: false,
            queue_capacity: 8,
            max_active_tasks: 1,
            max_upload_mb: 10,
            ytdlp_bin: "yt-dlp".to_owned(),
            whisper_bin: "whisper".to_owned(),
            enable_swagger: false,
            cors_allowed_origins: None,
        }
    }

    #[tokio::test]
    async fn urls_resolve_without_touching_disk() {
        let config = test_config(PathBuf::from("does-not-exist"));
        let resolved = resolve_source(&config, "https://example.com/watch?v=1")
            .await
            .unwrap();
        assert_eq!(
            resolved,
            SourceRef::Url("https://example.com/watch?v=1".to_owned())
        );
    }

    #[tokio::test]
    async fn upload_ids_resolve_to_the_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        let file_id = uuid::Uuid::new_v4().to_string();
        let stored = uploads.join(format!("{file_id}.mp4"));
        std::fs::write(&stored, b"").unwrap();

        let config = test_config(dir.path().to_path_buf());
        let resolved = resolve_source(&config, &file_id).await.unwrap();
        assert_eq!(resolved, SourceRef::Local(stored));
    }

    #[tokio::test]
    async fn existing_local_paths_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("video.mp4");
        std::fs::write(&local, b"").unwrap();

        let config = test_config(dir.path().to_path_buf());
        let resolved = resolve_source(&config, local.to_str().unwrap()).await.unwrap();
        assert_eq!(resolved, SourceRef::Local(local));
    }

    #[tokio::test]
    async fn unknown_sources_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().to_path_buf());
        let err = resolve_source(&config, "nope.mp4").await.unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
    }
}
