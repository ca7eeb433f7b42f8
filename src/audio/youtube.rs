//! YouTube URL parsing and metadata resolution.

use super::run_with_timeout;
use crate::error::{LekseError, Result};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;

/// Metadata resolved for a video before download.
#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
}

fn video_id_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        // Matches the URL forms YouTube hands out for a single video
        Regex::new(
            r"(?x)
            (?:https?://)?
            (?:www\.|m\.)?
            (?:
                youtube\.com/watch\?(?:[^\s\#]*&)?v=
                | youtu\.be/
                | youtube\.com/shorts/
                | youtube\.com/embed/
            )
            ([a-zA-Z0-9_-]{11})
            (?:[^a-zA-Z0-9_-]|$)
        ",
        )
        .expect("Invalid regex")
    })
}

/// Extract the 11-character video id from a YouTube URL.
///
/// Accepted forms: `watch?v=`, `youtu.be/`, `shorts/`, `embed/`.
pub fn extract_video_id(url: &str) -> Option<String> {
    video_id_regex()
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Fetch title and thumbnail for a video using yt-dlp, without downloading.
pub async fn fetch_metadata(video_id: &str, timeout: Duration) -> Result<VideoMetadata> {
    let url = format!("https://www.youtube.com/watch?v={}", video_id);

    let mut command = Command::new("yt-dlp");
    command.args(["--dump-json", "--no-download", "--no-warnings", "--no-playlist", &url]);

    let output = run_with_timeout(&mut command, timeout, "yt-dlp").await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(LekseError::Download(format!(
            "Video {} not found or unavailable: {}",
            video_id,
            stderr.trim()
        )));
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|e| LekseError::Download(format!("Failed to parse yt-dlp output: {}", e)))?;

    let title = json["title"].as_str().unwrap_or("Unknown Title").to_string();
    let thumbnail_url = json["thumbnail"].as_str().map(|s| s.to_string());

    Ok(VideoMetadata {
        video_id: video_id.to_string(),
        title,
        thumbnail_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id_url_forms() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?v=dQw4w9WgXcQ&t=42s",
            "https://www.youtube.com/watch?list=PLx&v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=share",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "http://m.youtube.com/watch?v=dQw4w9WgXcQ",
        ] {
            assert_eq!(
                extract_video_id(url).as_deref(),
                Some("dQw4w9WgXcQ"),
                "failed for {}",
                url
            );
        }
    }

    #[test]
    fn test_extract_video_id_rejects_invalid() {
        // Bare ids are not URLs
        assert_eq!(extract_video_id("dQw4w9WgXcQ"), None);
        assert_eq!(extract_video_id("https://example.com/watch?v=dQw4w9WgXcQ"), None);
        assert_eq!(extract_video_id("https://youtube.com/watch?v=tooshort"), None);
        assert_eq!(extract_video_id(""), None);
    }

    #[test]
    fn test_extract_video_id_ids_with_underscore_and_dash() {
        assert_eq!(
            extract_video_id("https://youtu.be/a-b_c-d_e-f").as_deref(),
            Some("a-b_c-d_e-f")
        );
    }
}
