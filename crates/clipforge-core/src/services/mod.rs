//! External tool adapters.
//!
//! Every stage ultimately shells out to one tool: yt-dlp for downloads,
//! ffmpeg/ffprobe for media work, whisper for speech-to-text. The traits
//! here are the seam between the runtime and those binaries; tests swap in
//! mock implementations, production uses [`Toolset::with_system_tools`].

pub mod ffmpeg;
pub mod whisper;
pub mod ytdlp;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::request::{ClipFormat, TextOverlaySpec, WhisperModel};
use crate::runtime::types::{FailureKind, StageFailure};
use crate::subtitle::Transcript;

/// A tool-level error, not yet attached to the stage that triggered it.
/// The executor converts these into [`StageFailure`]s.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct ToolError {
    pub kind: FailureKind,
    pub detail: String,
}

impl ToolError {
    pub fn invalid(detail: impl Into<String>) -> Self {
        ToolError {
            kind: FailureKind::InvalidInput,
            detail: detail.into(),
        }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        ToolError {
            kind: FailureKind::ToolUnavailable,
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        ToolError {
            kind: FailureKind::ToolExecutionFailed,
            detail: detail.into(),
        }
    }

    pub fn io(detail: impl Into<String>) -> Self {
        ToolError {
            kind: FailureKind::IoError,
            detail: detail.into(),
        }
    }

    /// Classify a subprocess spawn error: a missing binary is an
    /// environment problem, anything else is I/O.
    pub fn from_spawn(bin: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            ToolError::unavailable(format!(
                "{bin} binary not found; is it installed and on PATH?"
            ))
        } else {
            ToolError::io(format!("failed to launch {bin}: {err}"))
        }
    }

    /// Same classification for launchers that only surface rendered error
    /// strings (ffmpeg-sidecar). The io NotFound rendering is stable enough
    /// to match on.
    pub fn from_launch(bin: &str, message: String) -> Self {
        if message.contains("os error 2") || message.to_lowercase().contains("not found") {
            ToolError::unavailable(format!(
                "{bin} binary not found; is it installed and on PATH?"
            ))
        } else {
            ToolError::failed(format!("failed to launch {bin}: {message}"))
        }
    }

    pub fn into_failure(self, stage: &str) -> StageFailure {
        StageFailure::new(stage, self.kind, self.detail)
    }
}

/// Last portion of a tool's stderr, for failure details that stay readable.
pub(crate) fn stderr_excerpt(raw: &[u8]) -> String {
    const MAX_CHARS: usize = 800;
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_CHARS {
        return trimmed.to_owned();
    }
    let tail: String = {
        let chars: Vec<char> = trimmed.chars().collect();
        chars[chars.len() - MAX_CHARS..].iter().collect()
    };
    format!("…{tail}")
}

/// Fetches a remote source onto disk.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `url` to exactly `dest`.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), ToolError>;
}

/// The media transcoder family: ffmpeg for transforms, ffprobe for queries.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Container duration in seconds; `None` when the tool cannot tell
    /// (the random-window policy then falls back to the full source).
    async fn probe_duration(&self, input: &Path) -> Result<Option<f64>, ToolError>;

    /// Cut `[start, start + duration)` out of `input`. `duration == None`
    /// runs to the end of the source.
    async fn extract_clip(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        duration: Option<f64>,
    ) -> Result<(), ToolError>;

    /// Crop to the target aspect ratio, audio untouched.
    async fn crop_to_format(
        &self,
        input: &Path,
        output: &Path,
        format: ClipFormat,
    ) -> Result<(), ToolError>;

    /// Render captions and/or a banner onto the video in a single pass.
    async fn render_text(
        &self,
        input: &Path,
        output: &Path,
        captions: Option<&Path>,
        banner: Option<&TextOverlaySpec>,
    ) -> Result<(), ToolError>;
}

/// Speech-to-text: returns timed segments, never files. Serializing the
/// result is the runtime's job.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, input: &Path, model: WhisperModel) -> Result<Transcript, ToolError>;
}

/// The tool bundle handed to the stage executor.
#[derive(Clone)]
pub struct Toolset {
    pub downloader: Arc<dyn Downloader>,
    pub media: Arc<dyn MediaEngine>,
    pub transcriber: Arc<dyn Transcriber>,
}

impl Toolset {
    /// Production wiring: yt-dlp, ffmpeg/ffprobe and whisper subprocesses.
    /// The binary names for yt-dlp and whisper are configurable because
    /// both commonly live in per-user Python installs.
    pub fn with_system_tools(ytdlp_bin: impl Into<String>, whisper_bin: impl Into<String>) -> Self {
        Toolset {
            downloader: Arc::new(ytdlp::YtDlpDownloader::new(ytdlp_bin)),
            media: Arc::new(ffmpeg::FfmpegEngine::new()),
            transcriber: Arc::new(whisper::WhisperCli::new(whisper_bin)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_not_found_maps_to_tool_unavailable() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let tool_err = ToolError::from_spawn("yt-dlp", err);
        assert_eq!(tool_err.kind, FailureKind::ToolUnavailable);
        assert!(tool_err.detail.contains("yt-dlp"));
    }

    #[test]
    fn other_spawn_errors_map_to_io() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let tool_err = ToolError::from_spawn("ffprobe", err);
        assert_eq!(tool_err.kind, FailureKind::IoError);
    }

    #[test]
    fn launch_message_not_found_maps_to_tool_unavailable() {
        let rendered = "No such file or directory (os error 2)".to_owned();
        let tool_err = ToolError::from_launch("ffmpeg", rendered);
        assert_eq!(tool_err.kind, FailureKind::ToolUnavailable);
    }

    #[test]
    fn stderr_excerpt_keeps_the_tail() {
        let noise = "x".repeat(2000) + " actual error here";
        let excerpt = stderr_excerpt(noise.as_bytes());
        assert!(excerpt.ends_with("actual error here"));
        assert!(excerpt.starts_with('…'));
        assert!(excerpt.chars().count() <= 801);
    }

    #[test]
    fn into_failure_attaches_stage_name() {
        let failure = ToolError::failed("boom").into_failure("extract");
        assert_eq!(failure.stage, "extract");
        assert_eq!(failure.kind, FailureKind::ToolExecutionFailed);
    }
}
