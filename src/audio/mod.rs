//! Audio acquisition and processing.
//!
//! This module wraps the external tools the pipeline depends on: yt-dlp for
//! video acquisition and FFmpeg for probing and silence-based chunking.

mod chunker;
mod downloader;
mod youtube;

pub use chunker::{compute_split_points, Chunker};
pub use downloader::YtDlpFetcher;
pub use youtube::{extract_video_id, fetch_metadata, VideoMetadata};

use crate::error::{LekseError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// A resolved and materialized media item.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    /// 11-character external id.
    pub video_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    /// Absolute path of the downloaded audio artifact.
    pub audio_path: PathBuf,
}

/// Capability to turn a URL into an audio artifact on disk.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Resolve `url` and download its audio.
    ///
    /// Fails with `InvalidUrl` when no external id can be extracted and
    /// `Download` when the downloader subprocess fails or produces no file.
    async fn fetch(&self, url: &str) -> Result<FetchedMedia>;
}

/// Run an external tool to completion with a wall-clock limit.
///
/// The child is spawned with `kill_on_drop`, so expiry (or an abandoned
/// caller) kills the process rather than leaving it running.
pub(crate) async fn run_with_timeout(
    command: &mut Command,
    timeout: Duration,
    tool: &str,
) -> Result<std::process::Output> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            LekseError::ToolNotFound(tool.to_string())
        } else {
            LekseError::Io(e)
        }
    })?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(LekseError::Io(e)),
        Err(_) => Err(LekseError::Timeout(format!(
            "{} exceeded {}s wall clock",
            tool,
            timeout.as_secs()
        ))),
    }
}
