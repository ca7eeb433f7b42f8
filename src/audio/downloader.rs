//! Audio download via yt-dlp.

use super::{extract_video_id, fetch_metadata, run_with_timeout, FetchedMedia, MediaFetcher};
use crate::error::{LekseError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, instrument, warn};

/// How long metadata resolution may take.
const METADATA_TIMEOUT: Duration = Duration::from_secs(60);

/// yt-dlp-based media fetcher.
///
/// Downloads best audio transcoded to the configured format, with metadata
/// and thumbnail embedded, into `<storage>/audio/<video_id>.<ext>`.
pub struct YtDlpFetcher {
    audio_dir: PathBuf,
    audio_format: String,
    download_timeout: Duration,
}

impl YtDlpFetcher {
    pub fn new(audio_dir: PathBuf, audio_format: &str, download_timeout: Duration) -> Self {
        Self {
            audio_dir,
            audio_format: audio_format.to_string(),
            download_timeout,
        }
    }

    /// The stable output path for a video's audio.
    pub fn audio_path_for(&self, video_id: &str) -> PathBuf {
        self.audio_dir.join(format!("{}.{}", video_id, self.audio_format))
    }

    #[instrument(skip(self), fields(video_id = %video_id))]
    async fn download_audio(&self, video_id: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.audio_dir)?;

        let target_path = self.audio_path_for(video_id);
        if target_path.exists() {
            info!("Using cached audio file");
            return Ok(target_path);
        }

        let url = format!("https://www.youtube.com/watch?v={}", video_id);
        let template = self.audio_dir.join(format!("{}.%(ext)s", video_id));

        let mut command = Command::new("yt-dlp");
        command
            .arg("--extract-audio")
            .arg("--audio-format")
            .arg(&self.audio_format)
            .arg("--audio-quality")
            .arg("0")
            .arg("--embed-metadata")
            .arg("--output")
            .arg(template.to_str().unwrap_or_default())
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("--no-warnings");

        // Thumbnail embedding is only supported for tagged containers
        if self.audio_format == "mp3" {
            command.arg("--embed-thumbnail");
        }
        command.arg(&url);

        let output = run_with_timeout(&mut command, self.download_timeout, "yt-dlp").await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LekseError::Download(format!(
                "yt-dlp failed for {}: {}",
                video_id,
                stderr.trim()
            )));
        }

        if !target_path.exists() {
            warn!("yt-dlp reported success but output is missing");
            return Err(LekseError::Download(format!(
                "Audio file not found after download: {}",
                target_path.display()
            )));
        }

        Ok(target_path)
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedMedia> {
        let video_id = extract_video_id(url)
            .ok_or_else(|| LekseError::InvalidUrl(format!("Not a YouTube video URL: {}", url)))?;

        let metadata = fetch_metadata(&video_id, METADATA_TIMEOUT).await?;

        info!("Downloading audio for: {}", metadata.title);
        let audio_path = self.download_audio(&video_id).await?;

        Ok(FetchedMedia {
            video_id,
            title: metadata.title,
            thumbnail_url: metadata.thumbnail_url,
            audio_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_path_is_derived_from_id() {
        let fetcher = YtDlpFetcher::new(
            PathBuf::from("/storage/audio"),
            "mp3",
            Duration::from_secs(1800),
        );
        assert_eq!(
            fetcher.audio_path_for("dQw4w9WgXcQ"),
            PathBuf::from("/storage/audio/dQw4w9WgXcQ.mp3")
        );
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_url() {
        let fetcher = YtDlpFetcher::new(
            PathBuf::from("/tmp/lekse-test-audio"),
            "mp3",
            Duration::from_secs(1),
        );
        let err = fetcher.fetch("https://example.com/video").await.unwrap_err();
        assert!(matches!(err, LekseError::InvalidUrl(_)));
    }
}
