//! yt-dlp adapter for the download stage.

use std::ffi::OsString;
use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::services::{stderr_excerpt, Downloader, ToolError};

/// Prefer merged 1080p streams, then a single sub-1080p file, then whatever
/// the site offers.
const FORMAT_SELECTOR: &str = "bestvideo[height<=1080]+bestaudio/best[height<=1080]/best";

pub struct YtDlpDownloader {
    bin: String,
}

impl YtDlpDownloader {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), ToolError> {
        info!(url, dest = %dest.display(), "downloading source video");

        let output = Command::new(&self.bin)
            .args(download_args(url, dest))
            .output()
            .await
            .map_err(|e| ToolError::from_spawn(&self.bin, e))?;

        if !output.status.success() {
            return Err(ToolError::failed(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                stderr_excerpt(&output.stderr)
            )));
        }

        // yt-dlp can exit 0 without writing anything (e.g. --no-playlist
        // matching nothing), so the artifact is checked, not assumed.
        if !dest.exists() {
            return Err(ToolError::failed(format!(
                "yt-dlp reported success but produced no file at {}",
                dest.display()
            )));
        }

        debug!(dest = %dest.display(), "download complete");
        Ok(())
    }
}

fn download_args(url: &str, dest: &Path) -> Vec<OsString> {
    vec![
        OsString::from("-f"),
        OsString::from(FORMAT_SELECTOR),
        OsString::from("--merge-output-format"),
        OsString::from("mp4"),
        OsString::from("--no-playlist"),
        OsString::from("-o"),
        dest.as_os_str().to_owned(),
        OsString::from(url),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn download_args_cap_resolution_and_skip_playlists() {
        let dest = PathBuf::from("/tmp/source-abc.mp4");
        let args = download_args("https://example.com/watch?v=1", &dest);

        let rendered: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            rendered,
            vec![
                "-f",
                "bestvideo[height<=1080]+bestaudio/best[height<=1080]/best",
                "--merge-output-format",
                "mp4",
                "--no-playlist",
                "-o",
                "/tmp/source-abc.mp4",
                "https://example.com/watch?v=1",
            ]
        );
    }
}
