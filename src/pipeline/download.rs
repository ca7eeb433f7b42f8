//! Batch video download.

use super::{run_batch, Pipeline};
use crate::audio::extract_video_id;
use crate::error::LekseError;
use crate::store::{DownloadStatus, NewVideo, Video};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Per-item outcome of a download batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadItemStatus {
    Success,
    Duplicate,
    Failed,
}

/// Result for a single URL.
#[derive(Debug, Serialize)]
pub struct DownloadResult {
    pub url: String,
    pub status: DownloadItemStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadResult {
    fn failed(url: &str, message: &str, error: String) -> Self {
        Self {
            url: url.to_string(),
            status: DownloadItemStatus::Failed,
            message: message.to_string(),
            video_id: None,
            video: None,
            error: Some(error),
        }
    }

    fn duplicate(url: &str, video: Video) -> Self {
        Self {
            url: url.to_string(),
            status: DownloadItemStatus::Duplicate,
            message: "Video already downloaded".to_string(),
            video_id: Some(video.video_id.clone()),
            video: Some(video),
            error: None,
        }
    }
}

/// Download batch envelope.
#[derive(Debug, Serialize)]
pub struct DownloadBatch {
    pub results: Vec<DownloadResult>,
    pub total: usize,
    pub successful: usize,
    pub duplicates: usize,
    pub failed: usize,
}

impl Pipeline {
    /// Download a batch of URLs, one at a time, in order.
    #[instrument(skip(self, urls), fields(count = urls.len()))]
    pub async fn download_batch(&self, urls: &[String]) -> DownloadBatch {
        let results = run_batch(urls.iter().cloned(), |url| async move {
            self.download_one(&url).await
        })
        .await;

        let successful = results
            .iter()
            .filter(|r| r.status == DownloadItemStatus::Success)
            .count();
        let duplicates = results
            .iter()
            .filter(|r| r.status == DownloadItemStatus::Duplicate)
            .count();
        let failed = results
            .iter()
            .filter(|r| r.status == DownloadItemStatus::Failed)
            .count();

        info!(
            "Download batch complete: {} successful, {} duplicates, {} failed",
            successful, duplicates, failed
        );

        DownloadBatch {
            total: results.len(),
            successful,
            duplicates,
            failed,
            results,
        }
    }

    async fn download_one(&self, url: &str) -> DownloadResult {
        let Some(video_id) = extract_video_id(url) else {
            return DownloadResult::failed(
                url,
                "Not a recognized YouTube video URL",
                format!("Could not extract a video id from {}", url),
            );
        };

        // The external id is the business key; a known id short-circuits
        // the download entirely.
        match self.store.get_video(&video_id) {
            Ok(Some(existing)) => return DownloadResult::duplicate(url, existing),
            Ok(None) => {}
            Err(e) => return DownloadResult::failed(url, "Store lookup failed", e.to_string()),
        }

        let media = match self.fetcher.fetch(url).await {
            Ok(media) => media,
            Err(e) => {
                warn!("Download failed for {}: {}", url, e);
                return DownloadResult::failed(url, "Download failed", e.to_string());
            }
        };

        let new_video = NewVideo {
            video_id: media.video_id.clone(),
            title: media.title,
            thumbnail_url: media.thumbnail_url,
            audio_path: Some(media.audio_path.to_string_lossy().to_string()),
            download_status: DownloadStatus::Completed,
        };

        match self.store.insert_video(&new_video) {
            Ok(video) => DownloadResult {
                url: url.to_string(),
                status: DownloadItemStatus::Success,
                message: "Video downloaded successfully".to_string(),
                video_id: Some(video.video_id.clone()),
                video: Some(video),
                error: None,
            },
            // Raced by a concurrent request; report the surviving row
            Err(LekseError::Duplicate(_)) => match self.store.get_video(&media.video_id) {
                Ok(Some(existing)) => DownloadResult::duplicate(url, existing),
                _ => DownloadResult::failed(url, "Store insert failed", "duplicate id".to_string()),
            },
            Err(e) => DownloadResult::failed(url, "Store insert failed", e.to_string()),
        }
    }
}
