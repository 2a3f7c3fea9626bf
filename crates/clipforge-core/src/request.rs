//! Declarative description of everything a single clip task may do.
//!
//! A [`ClipRequest`] is built by the HTTP gateway or the CLI, validated
//! synchronously, and then turned into an executable plan by
//! [`Pipeline::plan`](crate::runtime::pipeline::Pipeline::plan). Nothing in
//! this module performs I/O.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Overlay text used when the caller enables the banner without providing one.
pub const DEFAULT_OVERLAY_TEXT: &str = "Follow for more content like this!";

/// Upper bound on extracted clip length, in seconds.
pub const MAX_CLIP_SECONDS: f64 = 300.0;

/// Where the input video comes from. Exactly one of the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// Remote video fetched by the download stage.
    Url(String),
    /// File already on disk; used as the initial media artifact directly.
    Local(PathBuf),
}

impl SourceRef {
    /// Classify a raw source string: `http(s)://` means remote, anything
    /// else is treated as a local path.
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            SourceRef::Url(raw.to_owned())
        } else {
            SourceRef::Local(PathBuf::from(raw))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, SourceRef::Url(_))
    }
}

/// Aspect-ratio target for the reformat stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipFormat {
    /// 9:16, TikTok / Reels / Shorts.
    Portrait,
    /// 1:1, feed posts.
    Square,
    /// 16:9, standard widescreen.
    Landscape,
}

impl ClipFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipFormat::Portrait => "portrait",
            ClipFormat::Square => "square",
            ClipFormat::Landscape => "landscape",
        }
    }
}

impl FromStr for ClipFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "portrait" => Ok(ClipFormat::Portrait),
            "square" => Ok(ClipFormat::Square),
            "landscape" => Ok(ClipFormat::Landscape),
            other => Err(format!(
                "unknown format '{other}' (expected portrait, square or landscape)"
            )),
        }
    }
}

impl std::fmt::Display for ClipFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Speech-to-text model size passed through to the transcription tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhisperModel {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl WhisperModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "tiny",
            WhisperModel::Base => "base",
            WhisperModel::Small => "small",
            WhisperModel::Medium => "medium",
            WhisperModel::Large => "large",
        }
    }
}

impl FromStr for WhisperModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tiny" => Ok(WhisperModel::Tiny),
            "base" => Ok(WhisperModel::Base),
            "small" => Ok(WhisperModel::Small),
            "medium" => Ok(WhisperModel::Medium),
            "large" => Ok(WhisperModel::Large),
            other => Err(format!(
                "unknown whisper model '{other}' (expected tiny, base, small, medium or large)"
            )),
        }
    }
}

impl std::fmt::Display for WhisperModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output form of a standalone transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptFormat {
    Srt,
    Txt,
}

impl TranscriptFormat {
    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            TranscriptFormat::Srt => "srt",
            TranscriptFormat::Txt => "txt",
        }
    }
}

impl FromStr for TranscriptFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "srt" => Ok(TranscriptFormat::Srt),
            "txt" => Ok(TranscriptFormat::Txt),
            other => Err(format!("unknown transcript format '{other}' (expected srt or txt)")),
        }
    }
}

/// Vertical placement of the banner text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayPosition {
    Top,
    Center,
    Bottom,
}

impl FromStr for OverlayPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(OverlayPosition::Top),
            "center" => Ok(OverlayPosition::Center),
            "bottom" => Ok(OverlayPosition::Bottom),
            other => Err(format!(
                "unknown overlay position '{other}' (expected top, center or bottom)"
            )),
        }
    }
}

/// Transcription parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscribeSpec {
    pub model: WhisperModel,
    /// Ignored (forced to SRT) when the captions are burned into the video.
    pub format: TranscriptFormat,
}

/// Static banner text drawn onto the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextOverlaySpec {
    pub text: String,
    pub position: OverlayPosition,
}

/// Which segment of the source the extract stage cuts out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClipWindow {
    /// Caller-chosen start offset and length, both in seconds.
    Explicit { start: f64, duration: f64 },
    /// Start offset picked at execution time so the clip fits the source.
    Random { duration: f64 },
}

/// A fully decided extraction window: `duration == None` means "to the end
/// of the source".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedWindow {
    pub start: f64,
    pub duration: Option<f64>,
}

impl ClipWindow {
    pub fn duration(&self) -> f64 {
        match self {
            ClipWindow::Explicit { duration, .. } => *duration,
            ClipWindow::Random { duration } => *duration,
        }
    }

    /// Decide the concrete window.
    ///
    /// `rand01` is a sample from `[0, 1)` supplied by the caller so the
    /// policy stays deterministic under test. For random windows the start
    /// offset is scaled into `[0, source - duration]`; when the source
    /// duration is unknown or not longer than the requested clip, the whole
    /// source is used instead. The result never describes a negative-length
    /// segment.
    pub fn resolve(&self, source_duration: Option<f64>, rand01: f64) -> ResolvedWindow {
        match *self {
            ClipWindow::Explicit { start, duration } => ResolvedWindow {
                start,
                duration: Some(duration),
            },
            ClipWindow::Random { duration } => match source_duration {
                Some(total) if total > duration => {
                    let start = (total - duration) * rand01.clamp(0.0, 1.0);
                    ResolvedWindow {
                        start,
                        duration: Some(duration),
                    }
                }
                _ => ResolvedWindow {
                    start: 0.0,
                    duration: None,
                },
            },
        }
    }
}

/// Everything one task may do, as data. Stage order is decided later by the
/// planner, not by field order here.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipRequest {
    pub source: SourceRef,
    /// Cut a segment out of the source; `None` processes the whole file.
    pub extract: Option<ClipWindow>,
    /// Run speech-to-text on the (possibly cut) video.
    pub transcribe: Option<TranscribeSpec>,
    /// Burn the transcribed captions into the video. Requires `transcribe`.
    pub burn_subtitles: bool,
    /// Draw a static banner onto the frame.
    pub overlay_text: Option<TextOverlaySpec>,
    /// Crop to a social-media aspect ratio.
    pub reformat: Option<ClipFormat>,
}

impl ClipRequest {
    /// A request that only runs the download stage.
    pub fn download_only(url: impl Into<String>) -> Self {
        ClipRequest {
            source: SourceRef::Url(url.into()),
            extract: None,
            transcribe: None,
            burn_subtitles: false,
            overlay_text: None,
            reformat: None,
        }
    }

    /// Structural validation. Invalid requests are rejected here, before a
    /// task exists; execution-time failures use the stage failure taxonomy
    /// instead.
    pub fn validate(&self) -> Result<(), InvalidRequest> {
        if let SourceRef::Url(url) = &self.source {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(InvalidRequest::UnsupportedScheme(url.clone()));
            }
        }

        if let Some(window) = &self.extract {
            let duration = window.duration();
            if !(duration > 0.0 && duration <= MAX_CLIP_SECONDS) {
                return Err(InvalidRequest::DurationOutOfRange {
                    got: duration,
                    max: MAX_CLIP_SECONDS,
                });
            }
            if let ClipWindow::Explicit { start, .. } = window {
                if *start < 0.0 {
                    return Err(InvalidRequest::NegativeStart(*start));
                }
            }
        }

        if let Some(overlay) = &self.overlay_text {
            if overlay.text.trim().is_empty() {
                return Err(InvalidRequest::EmptyOverlayText);
            }
        }

        if self.burn_subtitles && self.transcribe.is_none() {
            return Err(InvalidRequest::SubtitlesRequireTranscription);
        }

        let has_work = self.source.is_remote()
            || self.extract.is_some()
            || self.transcribe.is_some()
            || self.overlay_text.is_some()
            || self.reformat.is_some();
        if !has_work {
            return Err(InvalidRequest::Empty);
        }

        Ok(())
    }
}

/// Rejections raised at admission time. These never become tasks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidRequest {
    #[error("source url must use http or https: {0}")]
    UnsupportedScheme(String),

    #[error("clip duration must be between 0 and {max} seconds, got {got}")]
    DurationOutOfRange { got: f64, max: f64 },

    #[error("start time must not be negative, got {0}")]
    NegativeStart(f64),

    #[error("overlay text must not be empty")]
    EmptyOverlayText,

    #[error("burning subtitles requires transcription to be enabled")]
    SubtitlesRequireTranscription,

    #[error("request contains no operations")]
    Empty,
}
