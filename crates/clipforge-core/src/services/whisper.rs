//! OpenAI Whisper CLI adapter for the transcription stage.
//!
//! Whisper is asked for JSON (`--output_format json`) next to the input
//! file; the JSON is parsed into a [`Transcript`] and removed afterwards so
//! only the artifacts this crate formats itself are left in the task
//! directory.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::request::WhisperModel;
use crate::services::{stderr_excerpt, ToolError, Transcriber};
use crate::subtitle::{Transcript, TranscriptSegment};

pub struct WhisperCli {
    bin: String,
}

impl WhisperCli {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl Transcriber for WhisperCli {
    async fn transcribe(&self, input: &Path, model: WhisperModel) -> Result<Transcript, ToolError> {
        let out_dir = input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        info!(input = %input.display(), model = %model, "transcribing audio");

        let output = Command::new(&self.bin)
            .args(transcribe_args(input, model, &out_dir))
            .output()
            .await
            .map_err(|e| ToolError::from_spawn(&self.bin, e))?;

        if !output.status.success() {
            return Err(ToolError::failed(format!(
                "whisper exited with {}: {}",
                output.status,
                stderr_excerpt(&output.stderr)
            )));
        }

        let json_path = transcript_json_path(input, &out_dir);
        let raw = tokio::fs::read_to_string(&json_path).await.map_err(|e| {
            ToolError::failed(format!(
                "whisper reported success but its transcript at {} is unreadable: {e}",
                json_path.display()
            ))
        })?;

        // The JSON is an intermediate, not an artifact; drop it once parsed.
        if let Err(e) = tokio::fs::remove_file(&json_path).await {
            warn!(path = %json_path.display(), error = %e, "could not remove whisper json");
        }

        let transcript = parse_output(&raw)?;
        debug!(segments = transcript.segments.len(), "transcription complete");
        Ok(transcript)
    }
}

fn transcribe_args(input: &Path, model: WhisperModel, out_dir: &Path) -> Vec<OsString> {
    vec![
        input.as_os_str().to_owned(),
        OsString::from("--model"),
        OsString::from(model.as_str()),
        OsString::from("--output_format"),
        OsString::from("json"),
        OsString::from("--output_dir"),
        out_dir.as_os_str().to_owned(),
        // Keep CPU-only hosts working; fp16 needs CUDA.
        OsString::from("--fp16"),
        OsString::from("False"),
    ]
}

/// Whisper names its output after the input stem: `clip-ab12.mp4` becomes
/// `clip-ab12.json`.
fn transcript_json_path(input: &Path, out_dir: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or(input.as_os_str());
    let mut name = stem.to_owned();
    name.push(".json");
    out_dir.join(name)
}

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    #[serde(default)]
    text: String,
}

fn parse_output(raw: &str) -> Result<Transcript, ToolError> {
    let parsed: WhisperOutput = serde_json::from_str(raw)
        .map_err(|e| ToolError::failed(format!("whisper produced malformed json: {e}")))?;

    let segments = parsed
        .segments
        .into_iter()
        .map(|s| TranscriptSegment {
            start: s.start,
            end: s.end,
            text: s.text,
        })
        .collect();

    Ok(Transcript {
        text: parsed.text.trim().to_owned(),
        segments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whisper_json() {
        let raw = r#"{
            "text": " Hello world. Second part.",
            "segments": [
                {"id": 0, "seek": 0, "start": 0.0, "end": 2.4, "text": " Hello world."},
                {"id": 1, "seek": 0, "start": 2.4, "end": 4.0, "text": " Second part."}
            ],
            "language": "en"
        }"#;

        let transcript = parse_output(raw).expect("valid json");
        assert_eq!(transcript.text, "Hello world. Second part.");
        assert_eq!(transcript.segments.len(), 2);
        assert_eq!(transcript.segments[1].start, 2.4);
        assert_eq!(transcript.segments[1].text, " Second part.");
    }

    #[test]
    fn silence_yields_an_empty_transcript() {
        let transcript = parse_output(r#"{"text": "", "segments": []}"#).expect("valid json");
        assert!(transcript.is_empty());
    }

    #[test]
    fn malformed_json_is_a_tool_failure() {
        let err = parse_output("not json").expect_err("must fail");
        assert_eq!(err.kind, crate::runtime::types::FailureKind::ToolExecutionFailed);
    }

    #[test]
    fn json_path_follows_the_input_stem() {
        let path = transcript_json_path(Path::new("/out/ab12/clip-ab12.mp4"), Path::new("/out/ab12"));
        assert_eq!(path, PathBuf::from("/out/ab12/clip-ab12.json"));
    }

    #[test]
    fn model_flag_uses_the_cli_name() {
        let args = transcribe_args(Path::new("a.mp4"), WhisperModel::Base, Path::new("."));
        let rendered: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(rendered.contains(&"--model".to_owned()));
        assert!(rendered.contains(&"base".to_owned()));
        assert!(rendered.contains(&"--fp16".to_owned()));
        assert!(rendered.contains(&"False".to_owned()));
    }
}
