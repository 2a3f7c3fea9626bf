//! clipforge – turn a long video into a social-ready clip from the shell.
//!
//! Runs the same pipeline the HTTP server runs, but in-process and
//! blocking: build the request, start a local orchestrator, submit, print
//! stage transitions while polling, exit 0 on success and 1 on failure.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::debug;

use clipforge_core::{
    ClipFormat, ClipRequest, ClipWindow, DEFAULT_OVERLAY_TEXT, Orchestrator, OverlayPosition,
    Pipeline, SourceRef, StageExecutor, TaskStatus, TaskStore, TextOverlaySpec, Toolset,
    TranscribeSpec, TranscriptFormat, WhisperModel,
};

#[derive(Debug, Parser)]
#[command(
    name = "clipforge",
    version,
    about = "Download, cut, transcribe, caption and crop videos for social media"
)]
struct Cli {
    /// Video URL or local file path.
    source: String,

    /// Clip length in seconds.
    #[arg(short, long, default_value_t = 15.0)]
    duration: f64,

    /// Aspect-ratio target: portrait, square or landscape.
    #[arg(short, long, default_value = "portrait")]
    format: ClipFormat,

    /// Clip start offset in seconds; omitted means a random window.
    #[arg(long)]
    start: Option<f64>,

    /// Skip transcription and caption burn-in.
    #[arg(long)]
    no_subtitles: bool,

    /// Skip the banner text.
    #[arg(long)]
    no_text: bool,

    /// Banner text (defaults to a stock call-to-action).
    #[arg(long)]
    text: Option<String>,

    /// Banner placement: top, center or bottom.
    #[arg(long, default_value = "bottom")]
    text_position: OverlayPosition,

    /// Whisper model size: tiny, base, small, medium or large.
    #[arg(long, default_value = "base")]
    whisper_model: WhisperModel,

    /// Directory artifacts are written to.
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Only download the source; no cutting or captioning.
    #[arg(long, conflicts_with = "transcribe")]
    download_only: bool,

    /// Only produce a transcript; no cutting or captioning.
    #[arg(long)]
    transcribe: bool,

    /// Transcript output form for --transcribe: srt or txt.
    #[arg(long, default_value = "srt")]
    transcribe_format: TranscriptFormat,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// The same request construction the HTTP DTOs perform, driven by flags.
    fn build_request(&self) -> ClipRequest {
        let source = SourceRef::parse(&self.source);

        if self.download_only {
            return ClipRequest {
                source,
                extract: None,
                transcribe: None,
                burn_subtitles: false,
                overlay_text: None,
                reformat: None,
            };
        }

        if self.transcribe {
            return ClipRequest {
                source,
                extract: None,
                transcribe: Some(TranscribeSpec {
                    model: self.whisper_model,
                    format: self.transcribe_format,
                }),
                burn_subtitles: false,
                overlay_text: None,
                reformat: None,
            };
        }

        let subtitles = !self.no_subtitles;
        ClipRequest {
            source,
            extract: Some(match self.start {
                Some(start) => ClipWindow::Explicit {
                    start,
                    duration: self.duration,
                },
                None => ClipWindow::Random {
                    duration: self.duration,
                },
            }),
            transcribe: subtitles.then(|| TranscribeSpec {
                model: self.whisper_model,
                format: TranscriptFormat::Srt,
            }),
            burn_subtitles: subtitles,
            overlay_text: (!self.no_text).then(|| TextOverlaySpec {
                text: self
                    .text
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OVERLAY_TEXT.to_owned()),
                position: self.text_position,
            }),
            reformat: Some(self.format),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(if cli.verbose {
            "debug"
        } else {
            "warn"
        }))
        .init();

    let request = cli.build_request();
    debug!(?request, "built request");

    // Validation problems are usage errors: report and exit like clap does.
    let pipeline = match Pipeline::plan(&request) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };
    println!("pipeline: {}", pipeline.stage_names().join(" -> "));

    tokio::fs::create_dir_all(&cli.output_dir).await?;

    // The binary names commonly live in per-user Python installs, so they
    // stay overridable even without a config file.
    let tools = Toolset::with_system_tools(
        std::env::var("CLIPFORGE_YTDLP_BIN").unwrap_or_else(|_| "yt-dlp".to_owned()),
        std::env::var("CLIPFORGE_WHISPER_BIN").unwrap_or_else(|_| "whisper".to_owned()),
    );
    let executor = StageExecutor::new(tools, cli.output_dir.clone());
    let orchestrator = Orchestrator::start(executor, TaskStore::new(), 1, 1);

    let task_id = orchestrator.submit(pipeline).await?;

    // Poll until terminal, narrating stage transitions as they happen.
    let mut last_stage: Option<String> = None;
    let view = loop {
        let view = orchestrator.status(&task_id).await?;
        if view.stage != last_stage {
            if let Some(stage) = &view.stage {
                println!("[{:>3}%] {stage}...", view.progress);
            }
            last_stage = view.stage.clone();
        }
        if view.status.is_terminal() {
            break view;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    };

    match view.status {
        TaskStatus::Completed => {
            let artifact = view.result.expect("completed tasks carry a result");
            println!("done: {}", artifact.path.display());
            Ok(())
        }
        _ => {
            let error = view.error.expect("failed tasks carry an error");
            eprintln!("failed at '{}' ({}): {}", error.stage, error.kind, error.detail);
            std::process::exit(1);
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
