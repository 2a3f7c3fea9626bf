//! ffmpeg/ffprobe adapter.
//!
//! Transforms run through `ffmpeg-sidecar`: the command is built and
//! spawned on a blocking thread, log events are drained (error-level ones
//! collected into the failure detail) and the exit status decides success.
//! Duration probing shells out to plain `ffprobe`, because an unreadable
//! duration is an answer ("unknown"), not an error.

use std::path::Path;

use async_trait::async_trait;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use tokio::task;
use tracing::{debug, trace, warn};

use crate::request::{ClipFormat, OverlayPosition, TextOverlaySpec};
use crate::services::{MediaEngine, ToolError};

/// Stateless ffmpeg wrapper; the binary is resolved by ffmpeg-sidecar
/// (PATH or its downloaded copy).
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegEngine;

impl FfmpegEngine {
    pub fn new() -> Self {
        FfmpegEngine
    }

    /// Run one ffmpeg invocation to completion on a blocking thread.
    async fn run(input: &Path, between: Vec<String>, output: &Path) -> Result<(), ToolError> {
        let input = path_str(input)?.to_owned();
        let output = path_str(output)?.to_owned();

        task::spawn_blocking(move || -> Result<(), ToolError> {
            let mut command = FfmpegCommand::new();
            command
                .hide_banner()
                .overwrite()
                .input(&input)
                .args(between.iter().map(String::as_str))
                .output(&output)
                .print_command();

            let mut child = command
                .spawn()
                .map_err(|e| ToolError::from_launch("ffmpeg", e.to_string()))?;

            let mut tool_errors: Vec<String> = Vec::new();
            let events = child
                .iter()
                .map_err(|e| ToolError::failed(format!("ffmpeg event stream: {e}")))?;
            for event in events {
                match event {
                    FfmpegEvent::Error(msg) | FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, msg) => {
                        warn!("[ffmpeg] {msg}");
                        tool_errors.push(msg);
                    }
                    FfmpegEvent::Log(_, msg) => trace!("[ffmpeg] {msg}"),
                    FfmpegEvent::Done => debug!("ffmpeg finished: {output}"),
                    _ => {}
                }
            }

            let status = child
                .wait()
                .map_err(|e| ToolError::failed(format!("waiting for ffmpeg: {e}")))?;
            if !status.success() {
                let detail = if tool_errors.is_empty() {
                    format!("ffmpeg exited with {status}")
                } else {
                    format!("ffmpeg exited with {status}: {}", tool_errors.join("; "))
                };
                return Err(ToolError::failed(detail));
            }
            Ok(())
        })
        .await
        .map_err(|_| ToolError::failed("ffmpeg worker thread panicked"))?
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn probe_duration(&self, input: &Path) -> Result<Option<f64>, ToolError> {
        let probe = tokio::process::Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(input)
            .output()
            .await;

        let output = match probe {
            Ok(output) => output,
            // A missing or broken ffprobe degrades to "duration unknown";
            // the random-window policy then uses the full source.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("ffprobe binary not found; treating source duration as unknown");
                return Ok(None);
            }
            Err(e) => return Err(ToolError::io(format!("failed to launch ffprobe: {e}"))),
        };

        if !output.status.success() {
            warn!(
                status = %output.status,
                "ffprobe could not read the source; treating duration as unknown"
            );
            return Ok(None);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|d| d.is_finite() && *d > 0.0))
    }

    async fn extract_clip(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        duration: Option<f64>,
    ) -> Result<(), ToolError> {
        Self::run(input, extract_args(start, duration), output).await
    }

    async fn crop_to_format(
        &self,
        input: &Path,
        output: &Path,
        format: ClipFormat,
    ) -> Result<(), ToolError> {
        let args = vec![
            "-vf".to_owned(),
            crop_filter(format).to_owned(),
            "-c:a".to_owned(),
            "copy".to_owned(),
        ];
        Self::run(input, args, output).await
    }

    async fn render_text(
        &self,
        input: &Path,
        output: &Path,
        captions: Option<&Path>,
        banner: Option<&TextOverlaySpec>,
    ) -> Result<(), ToolError> {
        let Some(filter) = overlay_filter(captions, banner) else {
            return Err(ToolError::invalid("overlay invoked with nothing to render"));
        };
        let args = vec![
            "-vf".to_owned(),
            filter,
            "-c:a".to_owned(),
            "copy".to_owned(),
        ];
        Self::run(input, args, output).await
    }
}

fn path_str(path: &Path) -> Result<&str, ToolError> {
    path.to_str()
        .ok_or_else(|| ToolError::io(format!("path is not valid UTF-8: {}", path.display())))
}

/// Output-side seek: `-ss` after the input is slower than input seeking but
/// frame-accurate, which matters for clips cut to the second.
fn extract_args(start: f64, duration: Option<f64>) -> Vec<String> {
    let mut args = vec!["-ss".to_owned(), format!("{start}")];
    if let Some(duration) = duration {
        args.push("-t".to_owned());
        args.push(format!("{duration}"));
    }
    for arg in ["-c:v", "libx264", "-c:a", "aac"] {
        args.push(arg.to_owned());
    }
    args
}

/// Center-cut crop expressions per target ratio.
fn crop_filter(format: ClipFormat) -> &'static str {
    match format {
        ClipFormat::Portrait => "crop=ih*9/16:ih:iw/2-ih*9/32:0",
        ClipFormat::Square => "crop=ih:ih:iw/2-ih/2:0",
        ClipFormat::Landscape => "crop=iw:iw*9/16:0:ih/2-iw*9/32",
    }
}

fn position_expr(position: OverlayPosition) -> &'static str {
    match position {
        OverlayPosition::Top => "x=(w-text_w)/2:y=h*0.1",
        OverlayPosition::Center => "x=(w-text_w)/2:y=(h-text_h)/2",
        OverlayPosition::Bottom => "x=(w-text_w)/2:y=h*0.9",
    }
}

fn drawtext_filter(banner: &TextOverlaySpec) -> String {
    format!(
        "drawtext=text='{}':fontsize=24:fontcolor=white:bordercolor=black:borderw=2:{}",
        escape_drawtext(&banner.text),
        position_expr(banner.position)
    )
}

fn subtitles_filter(captions: &Path) -> String {
    format!(
        "subtitles={}:force_style='FontSize=24,PrimaryColour=&H00FFFFFF,\
         OutlineColour=&H00000000,BackColour=&H00000000,Bold=1,Alignment=2'",
        escape_filter_path(captions)
    )
}

/// The single `-vf` chain for the overlay stage: captions first so the
/// banner draws on top of them.
fn overlay_filter(captions: Option<&Path>, banner: Option<&TextOverlaySpec>) -> Option<String> {
    let mut filters = Vec::new();
    if let Some(captions) = captions {
        filters.push(subtitles_filter(captions));
    }
    if let Some(banner) = banner {
        filters.push(drawtext_filter(banner));
    }
    if filters.is_empty() {
        None
    } else {
        Some(filters.join(","))
    }
}

/// Inside the single-quoted drawtext value only the backslash and the quote
/// itself need care; quotes cannot be backslash-escaped in filter syntax,
/// so close-escape-reopen.
fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\'', "'\\''")
}

/// The subtitles path is unquoted filter input, so separator characters in
/// it must be escaped.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
        .replace(',', "\\,")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn crop_filters_match_target_ratios() {
        assert_eq!(
            crop_filter(ClipFormat::Portrait),
            "crop=ih*9/16:ih:iw/2-ih*9/32:0"
        );
        assert_eq!(crop_filter(ClipFormat::Square), "crop=ih:ih:iw/2-ih/2:0");
        assert_eq!(
            crop_filter(ClipFormat::Landscape),
            "crop=iw:iw*9/16:0:ih/2-iw*9/32"
        );
    }

    #[test]
    fn extract_args_include_window_and_codecs() {
        assert_eq!(
            extract_args(12.5, Some(15.0)),
            vec!["-ss", "12.5", "-t", "15", "-c:v", "libx264", "-c:a", "aac"]
        );
    }

    #[test]
    fn extract_args_omit_t_for_full_source() {
        assert_eq!(
            extract_args(0.0, None),
            vec!["-ss", "0", "-c:v", "libx264", "-c:a", "aac"]
        );
    }

    #[test]
    fn drawtext_places_banner_at_bottom() {
        let banner = TextOverlaySpec {
            text: "Follow for more".into(),
            position: OverlayPosition::Bottom,
        };
        assert_eq!(
            drawtext_filter(&banner),
            "drawtext=text='Follow for more':fontsize=24:fontcolor=white:\
             bordercolor=black:borderw=2:x=(w-text_w)/2:y=h*0.9"
        );
    }

    #[test]
    fn drawtext_escapes_quotes() {
        assert_eq!(escape_drawtext("it's live"), "it'\\''s live");
        assert_eq!(escape_drawtext("a\\b"), "a\\\\b");
    }

    #[test]
    fn subtitle_paths_escape_separators() {
        let path = PathBuf::from("out/captions:v1.srt");
        assert_eq!(escape_filter_path(&path), "out/captions\\:v1.srt");
    }

    #[test]
    fn overlay_chains_captions_before_banner() {
        let banner = TextOverlaySpec {
            text: "hi".into(),
            position: OverlayPosition::Top,
        };
        let captions = PathBuf::from("captions.srt");
        let filter = overlay_filter(Some(&captions), Some(&banner)).expect("filter");
        let subtitle_at = filter.find("subtitles=").expect("subtitles present");
        let drawtext_at = filter.find("drawtext=").expect("drawtext present");
        assert!(subtitle_at < drawtext_at, "captions must render first");
        assert!(filter.contains(','), "filters must form one chain");
    }

    #[test]
    fn overlay_with_nothing_to_render_is_none() {
        assert_eq!(overlay_filter(None, None), None);
    }
}
