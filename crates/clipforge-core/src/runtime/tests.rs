//! End-to-end runtime tests against a recording mock toolset.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};

use crate::request::{
    ClipFormat, ClipRequest, ClipWindow, OverlayPosition, SourceRef, TextOverlaySpec,
    TranscribeSpec, TranscriptFormat, WhisperModel,
};
use crate::runtime::executor::StageExecutor;
use crate::runtime::orchestrator::Orchestrator;
use crate::runtime::pipeline::Pipeline;
use crate::runtime::storage::{TaskStore, TaskView};
use crate::runtime::types::{FailureKind, RuntimeError, StageFailure, TaskId, TaskStatus, short_tag};
use crate::services::{Downloader, MediaEngine, ToolError, Toolset, Transcriber};
use crate::subtitle::{Transcript, TranscriptSegment};

// ── mock toolset ─────────────────────────────────────────────────────────────

#[derive(Clone)]
struct Gate {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    fn new() -> Self {
        Gate {
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

/// Implements all three tool traits, records every invocation, and writes
/// zero-byte stand-ins for the files the real tools would produce.
struct MockTools {
    calls: Arc<Mutex<Vec<String>>>,
    fail_at: Option<(&'static str, ToolError)>,
    gate: Option<Gate>,
    probed_duration: Option<f64>,
}

impl MockTools {
    fn new() -> Self {
        MockTools {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_at: None,
            gate: None,
            probed_duration: Some(120.0),
        }
    }

    fn failing(method: &'static str, error: ToolError) -> Self {
        MockTools {
            fail_at: Some((method, error)),
            ..Self::new()
        }
    }

    fn gated() -> (Self, Gate) {
        let gate = Gate::new();
        let mock = MockTools {
            gate: Some(gate.clone()),
            ..Self::new()
        };
        (mock, gate)
    }

    fn record(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }

    fn check(&self, method: &str) -> Result<(), ToolError> {
        match &self.fail_at {
            Some((m, error)) if *m == method => Err(error.clone()),
            _ => Ok(()),
        }
    }

    fn touch(path: &Path) -> Result<(), ToolError> {
        std::fs::write(path, b"").map_err(|e| ToolError::io(e.to_string()))
    }
}

#[async_trait]
impl Downloader for MockTools {
    async fn fetch(&self, _url: &str, dest: &Path) -> Result<(), ToolError> {
        self.record("fetch".to_owned());
        if let Some(gate) = &self.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        self.check("fetch")?;
        Self::touch(dest)
    }
}

#[async_trait]
impl MediaEngine for MockTools {
    async fn probe_duration(&self, _input: &Path) -> Result<Option<f64>, ToolError> {
        self.record("probe".to_owned());
        Ok(self.probed_duration)
    }

    async fn extract_clip(
        &self,
        _input: &Path,
        output: &Path,
        start: f64,
        duration: Option<f64>,
    ) -> Result<(), ToolError> {
        self.record(format!("extract:{start}:{duration:?}"));
        self.check("extract")?;
        Self::touch(output)
    }

    async fn crop_to_format(
        &self,
        _input: &Path,
        output: &Path,
        format: ClipFormat,
    ) -> Result<(), ToolError> {
        self.record(format!("crop:{}", format.as_str()));
        self.check("crop")?;
        Self::touch(output)
    }

    async fn render_text(
        &self,
        _input: &Path,
        output: &Path,
        captions: Option<&Path>,
        banner: Option<&TextOverlaySpec>,
    ) -> Result<(), ToolError> {
        self.record(format!(
            "render:captions={}:banner={}",
            captions.is_some(),
            banner.is_some()
        ));
        self.check("render")?;
        Self::touch(output)
    }
}

#[async_trait]
impl Transcriber for MockTools {
    async fn transcribe(&self, _input: &Path, model: WhisperModel) -> Result<Transcript, ToolError> {
        self.record(format!("transcribe:{}", model.as_str()));
        self.check("transcribe")?;
        Ok(Transcript::from_segments(vec![TranscriptSegment {
            start: 0.0,
            end: 2.0,
            text: "Hello clip".to_owned(),
        }]))
    }
}

fn toolset(mock: Arc<MockTools>) -> Toolset {
    Toolset {
        downloader: mock.clone(),
        media: mock.clone(),
        transcriber: mock,
    }
}

fn start_runtime(mock: Arc<MockTools>, dir: &Path) -> Orchestrator {
    let executor = StageExecutor::new(toolset(mock), dir.to_path_buf());
    Orchestrator::start(executor, TaskStore::new(), 8, 2)
}

/// Everything-on request: download, cut, transcribe, crop, burn + banner.
fn full_request(url: &str) -> ClipRequest {
    ClipRequest {
        source: SourceRef::Url(url.to_owned()),
        extract: Some(ClipWindow::Explicit {
            start: 3.0,
            duration: 10.0,
        }),
        transcribe: Some(TranscribeSpec {
            model: WhisperModel::Base,
            format: TranscriptFormat::Srt,
        }),
        burn_subtitles: true,
        overlay_text: Some(TextOverlaySpec {
            text: "Follow for more".to_owned(),
            position: OverlayPosition::Bottom,
        }),
        reformat: Some(ClipFormat::Portrait),
    }
}

async fn wait_terminal(orchestrator: &Orchestrator, task_id: TaskId) -> TaskView {
    timeout(
        Duration::from_secs(5),
        orchestrator.wait(&task_id, Duration::from_millis(10)),
    )
    .await
    .expect("task did not reach a terminal state in time")
    .expect("task disappeared while waiting")
}

// ── pipeline execution ───────────────────────────────────────────────────────

#[tokio::test]
async fn url_pipeline_runs_every_stage_and_completes() {
    let mock = Arc::new(MockTools::new());
    let calls = mock.calls.clone();
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = start_runtime(mock, dir.path());

    let pipeline = Pipeline::plan(&full_request("https://example.com/watch?v=1")).unwrap();
    let task_id = orchestrator.submit(pipeline).await.unwrap();
    let view = wait_terminal(&orchestrator, task_id).await;

    assert_eq!(view.status, TaskStatus::Completed);
    assert_eq!(view.progress, 100);
    assert!(view.error.is_none());

    let tag = short_tag(&task_id);
    let artifact = view.result.expect("completed tasks carry a result");
    let expected = format!("clip-{tag}-final.mp4");
    assert_eq!(artifact.file_name(), Some(expected.as_str()));

    assert_eq!(
        *calls.lock().unwrap(),
        vec![
            "fetch",
            "extract:3:Some(10.0)",
            "transcribe:base",
            "crop:portrait",
            "render:captions=true:banner=true",
        ]
    );

    // Intermediates are dropped once the terminal state is recorded; the
    // result and captions stay.
    let source = dir.path().join(format!("source-{tag}.mp4"));
    let cut = dir.path().join(format!("clip-{tag}.mp4"));
    let cropped = dir.path().join(format!("clip-{tag}-portrait.mp4"));
    timeout(Duration::from_secs(5), async {
        while source.exists() || cut.exists() || cropped.exists() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("superseded intermediates were not cleaned up");
    assert!(dir.path().join(format!("clip-{tag}-final.mp4")).exists());
    assert!(dir.path().join(format!("captions-{tag}.srt")).exists());
}

#[tokio::test]
async fn local_source_starts_at_extract() {
    let mock = Arc::new(MockTools::new());
    let calls = mock.calls.clone();
    let dir = tempfile::tempdir().unwrap();
    let seed = dir.path().join("seed.mp4");
    std::fs::write(&seed, b"").unwrap();
    let orchestrator = start_runtime(mock, dir.path());

    let request = ClipRequest {
        source: SourceRef::Local(seed.clone()),
        extract: Some(ClipWindow::Explicit {
            start: 0.0,
            duration: 15.0,
        }),
        transcribe: None,
        burn_subtitles: false,
        overlay_text: None,
        reformat: Some(ClipFormat::Square),
    };
    let task_id = orchestrator
        .submit(Pipeline::plan(&request).unwrap())
        .await
        .unwrap();
    let view = wait_terminal(&orchestrator, task_id).await;

    assert_eq!(view.status, TaskStatus::Completed);
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["extract:0:Some(15.0)", "crop:square"]
    );
    // The caller's own file is never part of cleanup.
    assert!(seed.exists());
}

#[tokio::test]
async fn random_window_lands_inside_the_probed_source() {
    let mock = Arc::new(MockTools::new());
    let calls = mock.calls.clone();
    let dir = tempfile::tempdir().unwrap();
    let seed = dir.path().join("seed.mp4");
    std::fs::write(&seed, b"").unwrap();
    let orchestrator = start_runtime(mock, dir.path());

    let request = ClipRequest {
        source: SourceRef::Local(seed),
        extract: Some(ClipWindow::Random { duration: 20.0 }),
        transcribe: None,
        burn_subtitles: false,
        overlay_text: None,
        reformat: None,
    };
    let task_id = orchestrator
        .submit(Pipeline::plan(&request).unwrap())
        .await
        .unwrap();
    let view = wait_terminal(&orchestrator, task_id).await;
    assert_eq!(view.status, TaskStatus::Completed);

    let calls = calls.lock().unwrap();
    assert_eq!(calls[0], "probe");
    let rest = calls[1].strip_prefix("extract:").expect("extract follows probe");
    let start: f64 = rest.split(':').next().unwrap().parse().unwrap();
    // Probe reports 120s, so a 20s clip starts somewhere in [0, 100].
    assert!((0.0..=100.0).contains(&start), "start {start} out of range");
    assert!(calls[1].ends_with(":Some(20.0)"));
}

// ── failure handling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn first_stage_failure_stops_the_pipeline() {
    let mock = Arc::new(MockTools::failing(
        "transcribe",
        ToolError::failed("model exploded"),
    ));
    let calls = mock.calls.clone();
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = start_runtime(mock, dir.path());

    let pipeline = Pipeline::plan(&full_request("https://example.com/watch?v=1")).unwrap();
    let task_id = orchestrator.submit(pipeline).await.unwrap();
    let view = wait_terminal(&orchestrator, task_id).await;

    assert_eq!(view.status, TaskStatus::Failed);
    assert!(view.result.is_none());
    // Two of five stages finished before the failure.
    assert_eq!(view.progress, 40);

    let error = view.error.expect("failed tasks carry an error");
    assert_eq!(error.stage, "transcribe");
    assert_eq!(error.kind, FailureKind::ToolExecutionFailed);
    assert!(error.detail.contains("model exploded"));

    let calls = calls.lock().unwrap();
    assert!(!calls.iter().any(|c| c.starts_with("crop")));
    assert!(!calls.iter().any(|c| c.starts_with("render")));
}

#[tokio::test]
async fn missing_tool_reports_unavailable() {
    let mock = Arc::new(MockTools::failing(
        "fetch",
        ToolError::unavailable("yt-dlp binary not found"),
    ));
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = start_runtime(mock, dir.path());

    let task_id = orchestrator
        .submit(Pipeline::plan(&ClipRequest::download_only("https://example.com/v")).unwrap())
        .await
        .unwrap();
    let view = wait_terminal(&orchestrator, task_id).await;

    let error = view.error.expect("failed tasks carry an error");
    assert_eq!(error.stage, "download");
    assert_eq!(error.kind, FailureKind::ToolUnavailable);
}

// ── cancellation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancellation_lands_at_the_next_stage_boundary() {
    let (mock, gate) = MockTools::gated();
    let mock = Arc::new(mock);
    let calls = mock.calls.clone();
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = start_runtime(mock, dir.path());

    let pipeline = Pipeline::plan(&full_request("https://example.com/watch?v=1")).unwrap();
    let task_id = orchestrator.submit(pipeline).await.unwrap();

    timeout(Duration::from_secs(5), gate.started.notified())
        .await
        .expect("download never started");
    orchestrator.cancel(task_id);

    // Hold the download until the cancel command has reached the store.
    let mut cancel_rx = orchestrator
        .store()
        .cancel_receiver(&task_id)
        .await
        .expect("task exists");
    if !*cancel_rx.borrow() {
        timeout(Duration::from_secs(5), cancel_rx.changed())
            .await
            .expect("cancel signal never landed")
            .expect("cancel sender dropped");
    }
    gate.release.notify_one();

    let view = wait_terminal(&orchestrator, task_id).await;
    assert_eq!(view.status, TaskStatus::Failed);
    assert!(view.result.is_none());

    let error = view.error.expect("cancelled tasks carry an error");
    assert_eq!(error.kind, FailureKind::Cancelled);
    assert_eq!(error.stage, "extract");

    let calls = calls.lock().unwrap();
    assert_eq!(*calls, vec!["fetch"]);
}

#[tokio::test]
async fn cancel_after_completion_is_ignored() {
    let mock = Arc::new(MockTools::new());
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = start_runtime(mock, dir.path());

    let task_id = orchestrator
        .submit(Pipeline::plan(&ClipRequest::download_only("https://example.com/v")).unwrap())
        .await
        .unwrap();
    let before = wait_terminal(&orchestrator, task_id).await;
    assert_eq!(before.status, TaskStatus::Completed);

    orchestrator.cancel(task_id);
    sleep(Duration::from_millis(50)).await;

    let after = orchestrator.status(&task_id).await.unwrap();
    assert_eq!(before, after);
}

// ── store lifecycle ──────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_task_status_is_not_found() {
    let mock = Arc::new(MockTools::new());
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = start_runtime(mock, dir.path());

    let missing = uuid::Uuid::new_v4();
    let result = orchestrator.status(&missing).await;
    assert!(matches!(
        result,
        Err(RuntimeError::TaskNotFound { task_id }) if task_id == missing
    ));
}

#[tokio::test]
async fn terminal_records_absorb_late_writes() {
    let mock = Arc::new(MockTools::new());
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = start_runtime(mock, dir.path());

    let task_id = orchestrator
        .submit(Pipeline::plan(&ClipRequest::download_only("https://example.com/v")).unwrap())
        .await
        .unwrap();
    let first = wait_terminal(&orchestrator, task_id).await;

    assert_eq!(first.status, TaskStatus::Completed);
    assert!(first.result.is_some() && first.error.is_none());
    let tag = short_tag(&task_id);
    let expected = format!("source-{tag}.mp4");
    assert_eq!(
        first.result.as_ref().and_then(|a| a.file_name()),
        Some(expected.as_str())
    );

    let store = orchestrator.store();
    store.begin_stage(&task_id, "zombie").await;
    store
        .fail(
            &task_id,
            StageFailure::new("zombie", FailureKind::IoError, "late writer"),
        )
        .await;
    store.finish_stage(&task_id, 1, 2).await;

    let second = orchestrator.status(&task_id).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn store_lists_newest_first() {
    let store = TaskStore::new();
    let first = store.create().await;
    sleep(Duration::from_millis(2)).await;
    let second = store.create().await;
    sleep(Duration::from_millis(2)).await;
    let third = store.create().await;

    let ids: Vec<TaskId> = store.list().await.into_iter().map(|v| v.task_id).collect();
    assert_eq!(ids, vec![third, second, first]);
}

#[tokio::test]
async fn store_progress_never_decreases() {
    let store = TaskStore::new();
    let task_id = store.create().await;

    store.begin_stage(&task_id, "extract").await;
    store.finish_stage(&task_id, 3, 4).await;
    assert_eq!(store.get(&task_id).await.unwrap().progress, 75);

    store.finish_stage(&task_id, 1, 4).await;
    assert_eq!(store.get(&task_id).await.unwrap().progress, 75);
}
