//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;

/// Runtime configuration for clipforge-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// Directory where task artifacts (clips, captions, transcripts) are
    /// written and served from via `/download/{filename}`.
    pub output_dir: PathBuf,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Task submission-queue capacity; excess submissions get HTTP 503.
    pub queue_capacity: usize,

    /// Maximum number of tasks running external tools at once. Further
    /// accepted tasks wait in `pending`.
    pub max_active_tasks: usize,

    /// Upload size cap in megabytes.
    pub max_upload_mb: usize,

    /// yt-dlp binary name or path.
    pub ytdlp_bin: String,

    /// whisper CLI binary name or path.
    pub whisper_bin: String,

    /// Serve Swagger UI at `/swagger-ui` (default: on).
    pub enable_swagger: bool,

    /// Comma-separated CORS origin allowlist; unset means wildcard.
    pub cors_allowed_origins: Option<String>,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("CLIPFORGE_BIND", "0.0.0.0:8000"),
            output_dir: PathBuf::from(env_or("CLIPFORGE_OUTPUT_DIR", "output")),
            log_level: env_or("CLIPFORGE_LOG", "info"),
            log_json: std::env::var("CLIPFORGE_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            queue_capacity: parse_env("CLIPFORGE_QUEUE_CAPACITY", 64),
            max_active_tasks: parse_env("CLIPFORGE_MAX_ACTIVE_TASKS", 2),
            max_upload_mb: parse_env("CLIPFORGE_MAX_UPLOAD_MB", 500),
            ytdlp_bin: env_or("CLIPFORGE_YTDLP_BIN", "yt-dlp"),
            whisper_bin: env_or("CLIPFORGE_WHISPER_BIN", "whisper"),
            enable_swagger: std::env::var("CLIPFORGE_ENABLE_SWAGGER")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            cors_allowed_origins: std::env::var("CLIPFORGE_CORS_ORIGINS").ok(),
        }
    }

    /// Where uploaded sources are stored, keyed by file id.
    pub fn uploads_dir(&self) -> PathBuf {
        self.output_dir.join("uploads")
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
