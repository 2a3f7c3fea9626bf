//! Core engine for clipforge: turns a [`ClipRequest`] into a planned
//! [`Pipeline`], runs it stage by stage against external tools (yt-dlp,
//! ffmpeg, whisper) and tracks every task's lifecycle in a [`TaskStore`].
//!
//! The server and CLI binaries are thin frontends over this crate:
//!
//! ```rust,ignore
//! let tools = Toolset::with_system_tools("yt-dlp", "whisper");
//! let executor = StageExecutor::new(tools, "output");
//! let orchestrator = Orchestrator::start(executor, TaskStore::new(), 64, 2);
//!
//! let pipeline = Pipeline::plan(&request)?;
//! let task_id = orchestrator.submit(pipeline).await?;
//! let view = orchestrator.wait(&task_id, Duration::from_millis(250)).await?;
//! ```

mod request;
mod subtitle;

pub mod runtime;
pub mod services;

pub use request::{
    ClipFormat, ClipRequest, ClipWindow, DEFAULT_OVERLAY_TEXT, InvalidRequest, MAX_CLIP_SECONDS,
    OverlayPosition, ResolvedWindow, SourceRef, TextOverlaySpec, TranscribeSpec, TranscriptFormat,
    WhisperModel,
};
pub use runtime::executor::{StageContext, StageExecutor};
pub use runtime::orchestrator::Orchestrator;
pub use runtime::pipeline::{Pipeline, StageSpec};
pub use runtime::storage::{TaskStore, TaskView};
pub use runtime::types::{
    Artifact, ArtifactKind, FailureKind, RuntimeError, StageFailure, TaskId, TaskStatus, short_tag,
};
pub use services::Toolset;
pub use subtitle::{Transcript, TranscriptSegment};
