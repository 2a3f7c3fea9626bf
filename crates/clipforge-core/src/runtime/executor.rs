//! One stage, one external tool invocation.
//!
//! The executor owns nothing task-shaped: it receives a stage descriptor
//! plus the task's [`StageContext`] and returns either the produced
//! [`Artifact`] or a [`StageFailure`]. It never touches the task store and
//! never mutates its inputs; the runner decides what to do with the result.

use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, info};

use crate::request::{ClipWindow, ResolvedWindow, TranscriptFormat};
use crate::runtime::pipeline::{Pipeline, StageSpec};
use crate::runtime::types::{Artifact, ArtifactKind, FailureKind, StageFailure, TaskId, short_tag};
use crate::services::{ToolError, Toolset};

/// Per-task artifact bag, owned by the runner and threaded through every
/// stage. `media` is the video the next stage operates on; `captions` is
/// the most recent transcript file.
#[derive(Debug)]
pub struct StageContext {
    dir: PathBuf,
    tag: String,
    media: Option<PathBuf>,
    captions: Option<PathBuf>,
    produced: Vec<Artifact>,
}

impl StageContext {
    pub fn new(dir: PathBuf, tag: String, initial_media: Option<PathBuf>) -> Self {
        StageContext {
            dir,
            tag,
            media: initial_media,
            captions: None,
            produced: Vec::new(),
        }
    }

    pub fn media(&self) -> Option<&Path> {
        self.media.as_deref()
    }

    pub fn captions(&self) -> Option<&Path> {
        self.captions.as_deref()
    }

    /// Record a stage's output and make it visible to later stages under
    /// its role.
    pub fn absorb(&mut self, artifact: Artifact) {
        match artifact.kind {
            ArtifactKind::Media => self.media = Some(artifact.path.clone()),
            ArtifactKind::Captions => self.captions = Some(artifact.path.clone()),
        }
        self.produced.push(artifact);
    }

    /// The artifact produced by the last executed stage; the task result
    /// for completed pipelines.
    pub fn final_artifact(&self) -> Option<&Artifact> {
        self.produced.last()
    }

    /// Media files this task produced that neither the final artifact nor
    /// any later stage refers to anymore. Caller-supplied local sources are
    /// never included.
    pub fn superseded_media(&self) -> Vec<PathBuf> {
        let keep_final = self.final_artifact().map(|a| a.path.clone());
        self.produced
            .iter()
            .filter(|a| a.kind == ArtifactKind::Media)
            .map(|a| a.path.clone())
            .filter(|p| Some(p) != self.media.as_ref() && Some(p) != keep_final.as_ref())
            .collect()
    }

    fn artifact_path(&self, name: String) -> PathBuf {
        self.dir.join(name)
    }
}

/// Executes individual stages by driving the external tools.
pub struct StageExecutor {
    tools: Toolset,
    output_dir: PathBuf,
}

impl StageExecutor {
    pub fn new(tools: Toolset, output_dir: impl Into<PathBuf>) -> Self {
        StageExecutor {
            tools,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Fresh context for one task: artifacts land in the executor's output
    /// directory, tagged with the task's short id.
    pub fn context_for(&self, task_id: &TaskId, pipeline: &Pipeline) -> StageContext {
        StageContext::new(
            self.output_dir.clone(),
            short_tag(task_id),
            pipeline.initial_media.clone(),
        )
    }

    /// Run one stage to completion.
    pub async fn execute(
        &self,
        stage: &StageSpec,
        ctx: &StageContext,
    ) -> Result<Artifact, StageFailure> {
        let stage_name = stage.name();

        tokio::fs::create_dir_all(&ctx.dir).await.map_err(|e| {
            StageFailure::new(
                stage_name,
                FailureKind::IoError,
                format!("creating output directory {}: {e}", ctx.dir.display()),
            )
        })?;

        let result = match stage {
            StageSpec::Download { url } => self.run_download(ctx, url).await,
            StageSpec::Extract { window } => self.run_extract(ctx, window).await,
            StageSpec::Transcribe { model, format } => {
                self.run_transcribe(ctx, *model, *format).await
            }
            StageSpec::Reformat { format } => self.run_reformat(ctx, *format).await,
            StageSpec::Overlay {
                text,
                burn_captions,
            } => self.run_overlay(ctx, text.as_ref(), *burn_captions).await,
        };

        result.map_err(|e| e.into_failure(stage_name))
    }

    async fn run_download(&self, ctx: &StageContext, url: &str) -> Result<Artifact, ToolError> {
        let dest = ctx.artifact_path(format!("source-{}.mp4", ctx.tag));
        info!(url, dest = %dest.display(), "downloading source");
        self.tools.downloader.fetch(url, &dest).await?;
        Ok(Artifact::media(dest))
    }

    async fn run_extract(
        &self,
        ctx: &StageContext,
        window: &ClipWindow,
    ) -> Result<Artifact, ToolError> {
        let input = require_media(ctx, "extract")?;

        let resolved: ResolvedWindow = match window {
            ClipWindow::Explicit { .. } => window.resolve(None, 0.0),
            ClipWindow::Random { .. } => {
                let probed = self.tools.media.probe_duration(input).await?;
                window.resolve(probed, rand::rng().random_range(0.0..1.0))
            }
        };
        info!(
            start = resolved.start,
            duration = resolved.duration,
            "extracting clip window"
        );

        let output = ctx.artifact_path(format!("clip-{}.mp4", ctx.tag));
        self.tools
            .media
            .extract_clip(input, &output, resolved.start, resolved.duration)
            .await?;
        Ok(Artifact::media(output))
    }

    async fn run_transcribe(
        &self,
        ctx: &StageContext,
        model: crate::request::WhisperModel,
        format: TranscriptFormat,
    ) -> Result<Artifact, ToolError> {
        let input = require_media(ctx, "transcribe")?;
        let transcript = self.tools.transcriber.transcribe(input, model).await?;
        if transcript.is_empty() {
            // Still a success: the caption file is written empty and a later
            // burn-in pass has nothing to draw.
            info!("transcription produced no segments");
        }

        let (name, contents) = match format {
            TranscriptFormat::Srt => (format!("captions-{}.srt", ctx.tag), transcript.to_srt()),
            TranscriptFormat::Txt => (
                format!("transcript-{}.txt", ctx.tag),
                transcript.to_plain_text(),
            ),
        };
        let output = ctx.artifact_path(name);
        tokio::fs::write(&output, contents)
            .await
            .map_err(|e| ToolError::io(format!("writing {}: {e}", output.display())))?;
        debug!(path = %output.display(), segments = transcript.segments.len(), "captions written");
        Ok(Artifact::captions(output))
    }

    async fn run_reformat(
        &self,
        ctx: &StageContext,
        format: crate::request::ClipFormat,
    ) -> Result<Artifact, ToolError> {
        let input = require_media(ctx, "reformat")?;
        let output = ctx.artifact_path(format!("clip-{}-{}.mp4", ctx.tag, format.as_str()));
        self.tools
            .media
            .crop_to_format(input, &output, format)
            .await?;
        Ok(Artifact::media(output))
    }

    async fn run_overlay(
        &self,
        ctx: &StageContext,
        text: Option<&crate::request::TextOverlaySpec>,
        burn_captions: bool,
    ) -> Result<Artifact, ToolError> {
        let input = require_media(ctx, "overlay")?;
        let captions = if burn_captions {
            Some(ctx.captions().ok_or_else(|| {
                ToolError::invalid("no captions artifact available to burn")
            })?)
        } else {
            None
        };
        if captions.is_none() && text.is_none() {
            return Err(ToolError::invalid("overlay stage has nothing to render"));
        }

        let output = ctx.artifact_path(format!("clip-{}-final.mp4", ctx.tag));
        self.tools
            .media
            .render_text(input, &output, captions, text)
            .await?;
        Ok(Artifact::media(output))
    }
}

fn require_media<'a>(ctx: &'a StageContext, stage: &str) -> Result<&'a Path, ToolError> {
    ctx.media()
        .ok_or_else(|| ToolError::invalid(format!("no media input for {stage} stage")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tracks_roles_and_final_artifact() {
        let mut ctx = StageContext::new("out".into(), "abcd1234".into(), Some("in.mp4".into()));
        assert_eq!(ctx.media(), Some(Path::new("in.mp4")));

        ctx.absorb(Artifact::media("out/clip.mp4".into()));
        ctx.absorb(Artifact::captions("out/captions.srt".into()));
        ctx.absorb(Artifact::media("out/final.mp4".into()));

        assert_eq!(ctx.media(), Some(Path::new("out/final.mp4")));
        assert_eq!(ctx.captions(), Some(Path::new("out/captions.srt")));
        assert_eq!(
            ctx.final_artifact().map(|a| a.path.clone()),
            Some(PathBuf::from("out/final.mp4"))
        );
    }

    #[test]
    fn superseded_media_excludes_final_current_and_captions() {
        let mut ctx = StageContext::new("out".into(), "abcd1234".into(), None);
        ctx.absorb(Artifact::media("out/source.mp4".into()));
        ctx.absorb(Artifact::media("out/clip.mp4".into()));
        ctx.absorb(Artifact::captions("out/captions.srt".into()));
        ctx.absorb(Artifact::media("out/final.mp4".into()));

        assert_eq!(
            ctx.superseded_media(),
            vec![PathBuf::from("out/source.mp4"), PathBuf::from("out/clip.mp4")]
        );
    }

    #[test]
    fn caller_local_source_is_never_superseded() {
        let mut ctx = StageContext::new("out".into(), "abcd1234".into(), Some("local.mp4".into()));
        ctx.absorb(Artifact::media("out/clip.mp4".into()));
        assert!(ctx.superseded_media().is_empty());
    }

    #[test]
    fn standalone_transcript_keeps_downloaded_source() {
        let mut ctx = StageContext::new("out".into(), "abcd1234".into(), None);
        ctx.absorb(Artifact::media("out/source.mp4".into()));
        ctx.absorb(Artifact::captions("out/transcript.txt".into()));

        // The source is still the current media artifact, so it survives.
        assert!(ctx.superseded_media().is_empty());
        assert_eq!(
            ctx.final_artifact().map(|a| a.kind),
            Some(ArtifactKind::Captions)
        );
    }
}
