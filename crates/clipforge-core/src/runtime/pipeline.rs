//! Turning a validated [`ClipRequest`] into an ordered stage plan.
//!
//! Planning is pure: no filesystem, no probing, no randomness. Replanning
//! the same request always yields the same pipeline, which is what makes
//! task submission cheap and the plan easy to test.

use std::path::PathBuf;

use crate::request::{
    ClipFormat, ClipRequest, ClipWindow, InvalidRequest, SourceRef, TextOverlaySpec,
    TranscribeSpec, TranscriptFormat, WhisperModel,
};

/// One stage to execute: a closed set, one external tool invocation each.
#[derive(Debug, Clone, PartialEq)]
pub enum StageSpec {
    /// Fetch a remote source onto disk.
    Download { url: String },
    /// Cut a window out of the current media artifact.
    Extract { window: ClipWindow },
    /// Run speech-to-text and serialize the result.
    Transcribe {
        model: WhisperModel,
        format: TranscriptFormat,
    },
    /// Crop the current media artifact to an aspect-ratio target.
    Reformat { format: ClipFormat },
    /// Render captions and/or banner text onto the current media artifact
    /// in a single transcoder pass.
    Overlay {
        text: Option<TextOverlaySpec>,
        burn_captions: bool,
    },
}

impl StageSpec {
    /// User-visible stage label, reported in task status.
    pub fn name(&self) -> &'static str {
        match self {
            StageSpec::Download { .. } => "download",
            StageSpec::Extract { .. } => "extract",
            StageSpec::Transcribe { .. } => "transcribe",
            StageSpec::Reformat { .. } => "reformat",
            StageSpec::Overlay { .. } => "overlay",
        }
    }
}

/// An ordered, replayable execution plan for one task.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub stages: Vec<StageSpec>,
    /// Local source file, when no download stage supplies the media.
    pub initial_media: Option<PathBuf>,
}

impl Pipeline {
    /// Validate `request` and derive its plan.
    ///
    /// Stage order is fixed: download, extract, transcribe, reformat,
    /// overlay. Reformat runs before overlay on purpose: banner positions
    /// and caption layout are computed against the frame the viewer will
    /// actually see, not a geometry that a later crop would change.
    /// Disabled stages are absent from the plan rather than planned as
    /// no-ops.
    pub fn plan(request: &ClipRequest) -> Result<Pipeline, InvalidRequest> {
        request.validate()?;

        let mut stages = Vec::new();
        let mut initial_media = None;

        match &request.source {
            SourceRef::Url(url) => stages.push(StageSpec::Download { url: url.clone() }),
            SourceRef::Local(path) => initial_media = Some(path.clone()),
        }

        if let Some(window) = request.extract {
            stages.push(StageSpec::Extract { window });
        }

        if let Some(TranscribeSpec { model, format }) = request.transcribe {
            // Burned captions are consumed by the overlay stage, which only
            // understands SRT; the caller's transcript format applies to
            // standalone transcription.
            let format = if request.burn_subtitles {
                TranscriptFormat::Srt
            } else {
                format
            };
            stages.push(StageSpec::Transcribe { model, format });
        }

        if let Some(format) = request.reformat {
            stages.push(StageSpec::Reformat { format });
        }

        if request.burn_subtitles || request.overlay_text.is_some() {
            stages.push(StageSpec::Overlay {
                text: request.overlay_text.clone(),
                burn_captions: request.burn_subtitles,
            });
        }

        Ok(Pipeline {
            stages,
            initial_media,
        })
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(StageSpec::name).collect()
    }
}
