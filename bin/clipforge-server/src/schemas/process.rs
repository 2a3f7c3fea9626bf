//! Request bodies for the processing endpoints.
//!
//! Each DTO converts into a core [`ClipRequest`] via `into_clip_request`;
//! the handler resolves the `source` string first (URL, upload id, or local
//! path) and passes the result in. Defaults mirror the CLI flags: portrait
//! format, `base` whisper model, bottom-positioned banner, 15-second clips.

use serde::Deserialize;
use utoipa::ToSchema;

use clipforge_core::{
    ClipFormat, ClipRequest, ClipWindow, DEFAULT_OVERLAY_TEXT, OverlayPosition, SourceRef,
    TextOverlaySpec, TranscribeSpec, TranscriptFormat, WhisperModel,
};

/// Clip length used when the caller asks for a window without a duration.
pub const DEFAULT_CLIP_SECONDS: f64 = 15.0;

fn default_true() -> bool {
    true
}

fn default_duration() -> f64 {
    DEFAULT_CLIP_SECONDS
}

fn default_format() -> ClipFormat {
    ClipFormat::Portrait
}

fn default_model() -> WhisperModel {
    WhisperModel::Base
}

fn default_position() -> OverlayPosition {
    OverlayPosition::Bottom
}

fn default_transcript_format() -> TranscriptFormat {
    TranscriptFormat::Srt
}

/// Full pipeline request (`POST /process`).
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProcessRequest {
    /// Video URL, uploaded file id, or server-local path.
    pub source: String,
    /// Clip start offset in seconds.
    pub start: Option<f64>,
    /// Clip length in seconds.
    pub duration: Option<f64>,
    /// Pick the clip window at random instead of using `start`.
    #[serde(default)]
    pub random: bool,
    /// Transcribe the clip and burn the captions in.
    #[serde(default = "default_true")]
    pub subtitles: bool,
    /// Draw a banner text onto the clip.
    #[serde(default = "default_true")]
    pub add_text: bool,
    /// Banner text; defaults to the stock call-to-action.
    pub text: Option<String>,
    #[serde(default = "default_position")]
    #[schema(value_type = String, example = "bottom")]
    pub text_position: OverlayPosition,
    #[serde(default = "default_format")]
    #[schema(value_type = String, example = "portrait")]
    pub format: ClipFormat,
    #[serde(default = "default_model")]
    #[schema(value_type = String, example = "base")]
    pub whisper_model: WhisperModel,
}

impl ProcessRequest {
    pub fn into_clip_request(self, source: SourceRef) -> ClipRequest {
        let extract = if self.random {
            Some(ClipWindow::Random {
                duration: self.duration.unwrap_or(DEFAULT_CLIP_SECONDS),
            })
        } else if self.start.is_some() || self.duration.is_some() {
            Some(ClipWindow::Explicit {
                start: self.start.unwrap_or(0.0),
                duration: self.duration.unwrap_or(DEFAULT_CLIP_SECONDS),
            })
        } else {
            None
        };

        ClipRequest {
            source,
            extract,
            transcribe: self.subtitles.then(|| TranscribeSpec {
                model: self.whisper_model,
                format: TranscriptFormat::Srt,
            }),
            burn_subtitles: self.subtitles,
            overlay_text: self.add_text.then(|| TextOverlaySpec {
                text: self
                    .text
                    .unwrap_or_else(|| DEFAULT_OVERLAY_TEXT.to_owned()),
                position: self.text_position,
            }),
            reformat: Some(self.format),
        }
    }
}

/// Download a video without further processing (`POST /download`).
#[derive(Debug, Deserialize, ToSchema)]
pub struct DownloadRequest {
    pub url: String,
}

/// Standalone transcription (`POST /transcribe`).
#[derive(Debug, Deserialize, ToSchema)]
pub struct TranscribeRequest {
    pub source: String,
    #[serde(default = "default_model")]
    #[schema(value_type = String, example = "base")]
    pub model: WhisperModel,
    /// `srt` or `txt`.
    #[serde(default = "default_transcript_format")]
    #[schema(value_type = String, example = "srt")]
    pub format: TranscriptFormat,
}

impl TranscribeRequest {
    pub fn into_clip_request(self, source: SourceRef) -> ClipRequest {
        ClipRequest {
            source,
            extract: None,
            transcribe: Some(TranscribeSpec {
                model: self.model,
                format: self.format,
            }),
            burn_subtitles: false,
            overlay_text: None,
            reformat: None,
        }
    }
}

/// Cut an explicit window out of the source (`POST /extract-clip`).
#[derive(Debug, Deserialize, ToSchema)]
pub struct ExtractClipRequest {
    pub source: String,
    #[serde(default)]
    pub start: f64,
    #[serde(default = "default_duration")]
    pub duration: f64,
}

impl ExtractClipRequest {
    pub fn into_clip_request(self, source: SourceRef) -> ClipRequest {
        ClipRequest {
            source,
            extract: Some(ClipWindow::Explicit {
                start: self.start,
                duration: self.duration,
            }),
            transcribe: None,
            burn_subtitles: false,
            overlay_text: None,
            reformat: None,
        }
    }
}

/// Full treatment of a randomly chosen window (`POST /generate-random-clip`).
#[derive(Debug, Deserialize, ToSchema)]
pub struct RandomClipRequest {
    pub source: String,
    #[serde(default = "default_duration")]
    pub duration: f64,
    #[serde(default = "default_true")]
    pub subtitles: bool,
    #[serde(default = "default_true")]
    pub add_text: bool,
    pub text: Option<String>,
    #[serde(default = "default_position")]
    #[schema(value_type = String, example = "bottom")]
    pub text_position: OverlayPosition,
    #[serde(default = "default_format")]
    #[schema(value_type = String, example = "portrait")]
    pub format: ClipFormat,
    #[serde(default = "default_model")]
    #[schema(value_type = String, example = "base")]
    pub whisper_model: WhisperModel,
}

impl RandomClipRequest {
    pub fn into_clip_request(self, source: SourceRef) -> ClipRequest {
        ClipRequest {
            source,
            extract: Some(ClipWindow::Random {
                duration: self.duration,
            }),
            transcribe: self.subtitles.then(|| TranscribeSpec {
                model: self.whisper_model,
                format: TranscriptFormat::Srt,
            }),
            burn_subtitles: self.subtitles,
            overlay_text: self.add_text.then(|| TextOverlaySpec {
                text: self
                    .text
                    .unwrap_or_else(|| DEFAULT_OVERLAY_TEXT.to_owned()),
                position: self.text_position,
            }),
            reformat: Some(self.format),
        }
    }
}

/// Burn transcribed captions into an existing video (`POST /add-subtitles`).
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddSubtitlesRequest {
    pub source: String,
    #[serde(default = "default_model")]
    #[schema(value_type = String, example = "base")]
    pub model: WhisperModel,
}

impl AddSubtitlesRequest {
    pub fn into_clip_request(self, source: SourceRef) -> ClipRequest {
        ClipRequest {
            source,
            extract: None,
            transcribe: Some(TranscribeSpec {
                model: self.model,
                format: TranscriptFormat::Srt,
            }),
            burn_subtitles: true,
            overlay_text: None,
            reformat: None,
        }
    }
}

/// Draw a banner onto an existing video (`POST /add-text-overlay`).
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddTextRequest {
    pub source: String,
    pub text: Option<String>,
    #[serde(default = "default_position")]
    #[schema(value_type = String, example = "bottom")]
    pub position: OverlayPosition,
}

impl AddTextRequest {
    pub fn into_clip_request(self, source: SourceRef) -> ClipRequest {
        ClipRequest {
            source,
            extract: None,
            transcribe: None,
            burn_subtitles: false,
            overlay_text: Some(TextOverlaySpec {
                text: self
                    .text
                    .unwrap_or_else(|| DEFAULT_OVERLAY_TEXT.to_owned()),
                position: self.position,
            }),
            reformat: None,
        }
    }
}

/// Crop to a social aspect ratio (`POST /crop-for-social`).
#[derive(Debug, Deserialize, ToSchema)]
pub struct CropRequest {
    pub source: String,
    #[serde(default = "default_format")]
    #[schema(value_type = String, example = "portrait")]
    pub format: ClipFormat,
}

impl CropRequest {
    pub fn into_clip_request(self, source: SourceRef) -> ClipRequest {
        ClipRequest {
            source,
            extract: None,
            transcribe: None,
            burn_subtitles: false,
            overlay_text: None,
            reformat: Some(self.format),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
