//! Silence-based audio chunking.
//!
//! Splits oversized audio files at silence boundaries into pieces small
//! enough for remote transcription. Cuts are stream-copied (no re-encode);
//! chunk rows are persisted in one transaction and partial files are
//! removed on failure.

use super::run_with_timeout;
use crate::config::ChunkingSettings;
use crate::error::{LekseError, Result};
use crate::store::{AudioChunk, NewChunk, Store, Video};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Audio chunker wrapping FFmpeg.
pub struct Chunker {
    settings: ChunkingSettings,
    /// `<storage>/audio/chunks`
    chunks_root: PathBuf,
}

impl Chunker {
    pub fn new(settings: ChunkingSettings, storage_path: &Path) -> Self {
        Self {
            settings,
            chunks_root: storage_path.join("audio").join("chunks"),
        }
    }

    fn threshold_bytes(&self) -> u64 {
        (self.settings.max_chunk_size_mb * 1024.0 * 1024.0) as u64
    }

    fn ffmpeg_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.ffmpeg_timeout_s)
    }

    /// Split a video's audio if it exceeds the size threshold.
    ///
    /// Idempotent: returns the existing chunk set when one is already
    /// persisted. Returns an empty list when the file is small enough to be
    /// used whole.
    #[instrument(skip(self, store, video), fields(video_id = %video.video_id))]
    pub async fn ensure_chunks(&self, store: &Store, video: &Video) -> Result<Vec<AudioChunk>> {
        let existing = store.chunks_for_video(&video.video_id)?;
        if !existing.is_empty() {
            debug!("Chunks already exist, skipping");
            return Ok(existing);
        }

        let audio_path = video
            .audio_path
            .as_deref()
            .ok_or_else(|| LekseError::Chunking(format!("Video {} has no audio file", video.video_id)))?;
        let audio_path = Path::new(audio_path);

        let file_size = std::fs::metadata(audio_path)
            .map_err(|e| LekseError::Chunking(format!("Cannot stat {}: {}", audio_path.display(), e)))?
            .len();

        if file_size <= self.threshold_bytes() {
            debug!("File is {} bytes, below threshold; no chunking needed", file_size);
            return Ok(Vec::new());
        }

        let duration = probe_duration(audio_path, self.ffmpeg_timeout()).await?;
        let silence_points = self.detect_silence(audio_path).await?;
        info!(
            "Splitting {:.1}s / {} bytes using {} silence candidates",
            duration,
            file_size,
            silence_points.len()
        );

        let split_points =
            compute_split_points(duration, file_size, self.threshold_bytes(), &silence_points);
        let bounds_ms = segment_bounds_ms(duration, &split_points);

        let chunk_dir = self.chunks_root.join(&video.video_id);
        std::fs::create_dir_all(&chunk_dir)?;

        let extension = audio_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp3")
            .to_string();

        let mut new_chunks = Vec::with_capacity(bounds_ms.len() - 1);
        let mut created_files = Vec::new();

        for (index, window) in bounds_ms.windows(2).enumerate() {
            let (start_ms, end_ms) = (window[0], window[1]);
            let chunk_path = chunk_dir.join(format!(
                "{}_chunk_{:03}.{}",
                video.video_id, index, extension
            ));

            let result = self
                .extract_segment(audio_path, &chunk_path, start_ms, end_ms)
                .await;

            match result {
                Ok(()) => {
                    let size = std::fs::metadata(&chunk_path).map(|m| m.len()).unwrap_or(0);
                    created_files.push(chunk_path.clone());
                    new_chunks.push(NewChunk {
                        chunk_index: index as i64,
                        file_path: chunk_path.to_string_lossy().to_string(),
                        file_size: size as i64,
                        start_ms,
                        end_ms,
                    });
                    debug!("Created chunk {} [{} ms, {} ms]", index, start_ms, end_ms);
                }
                Err(e) => {
                    remove_files(&created_files);
                    let _ = std::fs::remove_dir(&chunk_dir);
                    return Err(LekseError::Chunking(format!(
                        "Failed to cut chunk {} of {}: {}",
                        index, video.video_id, e
                    )));
                }
            }
        }

        let chunks = match store.insert_chunks(&video.video_id, &new_chunks) {
            Ok(chunks) => chunks,
            Err(e) => {
                remove_files(&created_files);
                let _ = std::fs::remove_dir(&chunk_dir);
                return Err(LekseError::Chunking(format!(
                    "Failed to persist chunks for {}: {}",
                    video.video_id, e
                )));
            }
        };

        info!("Created {} chunks for {}", chunks.len(), video.video_id);

        if self.settings.delete_original_after_chunking {
            if let Err(e) = std::fs::remove_file(audio_path) {
                warn!("Failed to remove original audio {}: {}", audio_path.display(), e);
            }
        }

        Ok(chunks)
    }

    /// Detect silence midpoints with FFmpeg's silencedetect filter.
    ///
    /// The filter logs to stderr; midpoints are the centers of each
    /// detected silence interval.
    async fn detect_silence(&self, audio_path: &Path) -> Result<Vec<f64>> {
        let filter = format!(
            "silencedetect=noise={}dB:d={}",
            self.settings.silence_threshold_db, self.settings.min_silence_duration_s
        );

        let mut command = Command::new("ffmpeg");
        command
            .arg("-i")
            .arg(audio_path)
            .arg("-af")
            .arg(&filter)
            .arg("-f")
            .arg("null")
            .arg("-");

        let output = run_with_timeout(&mut command, self.ffmpeg_timeout(), "ffmpeg").await?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(LekseError::Chunking(format!(
                "silencedetect failed: {}",
                stderr.trim()
            )));
        }

        Ok(parse_silence_midpoints(&stderr))
    }

    /// Cut one segment in stream-copy mode.
    async fn extract_segment(
        &self,
        source: &Path,
        dest: &Path,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<()> {
        let mut command = Command::new("ffmpeg");
        command
            .arg("-ss")
            .arg(format!("{:.3}", start_ms as f64 / 1000.0))
            .arg("-i")
            .arg(source)
            .arg("-t")
            .arg(format!("{:.3}", (end_ms - start_ms) as f64 / 1000.0))
            .arg("-c")
            .arg("copy")
            .arg("-y")
            .arg("-loglevel")
            .arg("error")
            .arg(dest);

        let output = run_with_timeout(&mut command, self.ffmpeg_timeout(), "ffmpeg").await?;

        if !output.status.success() || !dest.exists() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LekseError::Chunking(format!(
                "ffmpeg segment extraction failed: {}",
                stderr.trim()
            )));
        }

        Ok(())
    }
}

fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove partial chunk {}: {}", path.display(), e);
        }
    }
}

/// Queries the duration of an audio file using ffprobe with JSON output.
pub(crate) async fn probe_duration(path: &Path, timeout: Duration) -> Result<f64> {
    let mut command = Command::new("ffprobe");
    command
        .arg("-v")
        .arg("quiet")
        .arg("-print_format")
        .arg("json")
        .arg("-show_format")
        .arg(path);

    let output = run_with_timeout(&mut command, timeout, "ffprobe").await?;

    if !output.status.success() {
        return Err(LekseError::Chunking("ffprobe returned error".into()));
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|_| LekseError::Chunking("Invalid ffprobe output".into()))?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| LekseError::Chunking("Could not determine audio duration".into()))
}

/// Parse `silence_start` / `silence_end` pairs from silencedetect stderr
/// and return the midpoint of each interval.
fn parse_silence_midpoints(stderr: &str) -> Vec<f64> {
    let start_re = Regex::new(r"silence_start:\s*([0-9.]+)").expect("Invalid regex");
    let end_re = Regex::new(r"silence_end:\s*([0-9.]+)").expect("Invalid regex");

    let starts: Vec<f64> = start_re
        .captures_iter(stderr)
        .filter_map(|c| c[1].parse().ok())
        .collect();
    let ends: Vec<f64> = end_re
        .captures_iter(stderr)
        .filter_map(|c| c[1].parse().ok())
        .collect();

    starts
        .iter()
        .zip(ends.iter())
        .map(|(start, end)| (start + end) / 2.0)
        .collect()
}

/// Compute interior split points for an oversized file.
///
/// The target chunk duration scales the total duration by the size ratio
/// with a 5% safety margin. The walk is greedy: from each offset, cut at
/// the latest silence midpoint within the window, or exactly at the window
/// edge when no silence is available.
pub fn compute_split_points(
    duration: f64,
    file_size: u64,
    threshold: u64,
    silence_points: &[f64],
) -> Vec<f64> {
    if duration <= 0.0 || file_size <= threshold {
        return Vec::new();
    }

    let target = duration * (threshold as f64 / file_size as f64) * 0.95;
    if target <= 0.0 {
        return Vec::new();
    }

    let mut sorted: Vec<f64> = silence_points.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut points = Vec::new();
    let mut offset = 0.0;

    loop {
        let window_end = offset + target;
        if window_end >= duration {
            break;
        }

        let cut = sorted
            .iter()
            .copied()
            .filter(|p| *p > offset && *p <= window_end)
            .next_back()
            .unwrap_or(window_end);

        points.push(cut);
        offset = cut;
    }

    points
}

/// Millisecond segment boundaries: `[0, split…, duration]`.
///
/// Adjacent segments share their boundary exactly, so the produced chunks
/// are contiguous and cover the full duration.
pub(crate) fn segment_bounds_ms(duration: f64, split_points: &[f64]) -> Vec<i64> {
    let mut bounds = Vec::with_capacity(split_points.len() + 2);
    bounds.push(0);
    bounds.extend(split_points.iter().map(|p| (p * 1000.0).round() as i64));
    bounds.push((duration * 1000.0).round() as i64);
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn test_small_file_needs_no_split() {
        assert!(compute_split_points(300.0, 10 * MB, 25 * MB, &[50.0, 100.0]).is_empty());
        assert!(compute_split_points(300.0, 25 * MB, 25 * MB, &[50.0]).is_empty());
    }

    #[test]
    fn test_splits_prefer_silence() {
        // 120 MB over 600s with a 25 MB threshold: target ≈ 118.75s
        let silence: Vec<f64> = (1..12).map(|i| i as f64 * 50.0).collect();
        let points = compute_split_points(600.0, 120 * MB, 25 * MB, &silence);

        assert_eq!(points, vec![100.0, 200.0, 300.0, 400.0, 500.0]);
    }

    #[test]
    fn test_forced_cuts_without_silence() {
        let points = compute_split_points(600.0, 120 * MB, 25 * MB, &[]);
        let target = 600.0 * (25.0 / 120.0) * 0.95;

        assert_eq!(points.len(), 5);
        for (i, p) in points.iter().enumerate() {
            assert!((p - target * (i + 1) as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn test_segments_are_bounded_by_target() {
        let silence = vec![30.0, 95.0, 110.0, 220.0, 310.0, 450.0, 580.0];
        let duration = 600.0;
        let points = compute_split_points(duration, 120 * MB, 25 * MB, &silence);
        let target = duration * (25.0 / 120.0) * 0.95;

        let bounds = segment_bounds_ms(duration, &points);
        for window in bounds.windows(2) {
            let len_s = (window[1] - window[0]) as f64 / 1000.0;
            assert!(len_s <= target + 0.001, "segment of {}s exceeds target {}s", len_s, target);
        }
    }

    #[test]
    fn test_bounds_are_contiguous_and_cover_duration() {
        let silence = vec![90.0, 180.0, 333.3, 470.2];
        let duration = 612.7;
        let points = compute_split_points(duration, 200 * MB, 25 * MB, &silence);
        let bounds = segment_bounds_ms(duration, &points);

        assert_eq!(bounds[0], 0);
        assert_eq!(*bounds.last().unwrap(), 612_700);
        for window in bounds.windows(2) {
            assert!(window[1] > window[0], "bounds must be strictly increasing");
        }
    }

    #[test]
    fn test_walk_makes_progress_past_stale_silence() {
        // Midpoints at or before the current offset must not stall the walk
        let silence = vec![0.0, 10.0, 10.0, 10.0];
        let points = compute_split_points(100.0, 100 * MB, 25 * MB, &silence);
        assert!(!points.is_empty());
        for window in points.windows(2) {
            assert!(window[1] > window[0]);
        }
    }

    #[test]
    fn test_parse_silence_midpoints() {
        let stderr = r#"
[silencedetect @ 0x5555] silence_start: 12.25
[silencedetect @ 0x5555] silence_end: 12.75 | silence_duration: 0.5
[silencedetect @ 0x5555] silence_start: 100.0
[silencedetect @ 0x5555] silence_end: 101.0 | silence_duration: 1.0
size=N/A time=00:10:00.00 bitrate=N/A speed= 500x
"#;
        assert_eq!(parse_silence_midpoints(stderr), vec![12.5, 100.5]);
    }

    #[test]
    fn test_parse_silence_handles_trailing_unpaired_start() {
        let stderr = "silence_start: 590.0\n";
        assert!(parse_silence_midpoints(stderr).is_empty());
    }
}
