//! Batch transcription: locate → prepare → transcribe → embed → persist.

use super::{run_batch, Pipeline};
use crate::error::{LekseError, Result};
use crate::retry::RetryPolicy;
use crate::store::Video;
use serde::Serialize;
use std::path::Path;
use tracing::{info, instrument, warn};

/// The five pipeline steps a transcription item moves through.
const TOTAL_STEPS: u32 = 5;

/// Per-item outcome of a transcription batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscribeItemStatus {
    Success,
    NotFound,
    NoAudio,
    Failed,
}

/// Result for a single video id.
#[derive(Debug, Serialize)]
pub struct TranscribeResult {
    pub video_id: String,
    pub status: TranscribeItemStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription_id: Option<i64>,
    pub steps_completed: u32,
    pub total_steps: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TranscribeResult {
    fn new(video_id: &str, status: TranscribeItemStatus, message: &str, steps: u32) -> Self {
        Self {
            video_id: video_id.to_string(),
            status,
            message: message.to_string(),
            transcription_id: None,
            steps_completed: steps,
            total_steps: TOTAL_STEPS,
            error: None,
        }
    }

    fn failed(video_id: &str, message: &str, error: String, steps: u32) -> Self {
        Self {
            error: Some(error),
            ..Self::new(video_id, TranscribeItemStatus::Failed, message, steps)
        }
    }
}

/// Transcription batch envelope.
#[derive(Debug, Serialize)]
pub struct TranscribeBatch {
    pub results: Vec<TranscribeResult>,
    pub total: usize,
    pub successful: usize,
    pub not_found: usize,
    pub no_audio: usize,
    pub failed: usize,
}

impl Pipeline {
    /// Transcribe a batch of videos, one at a time, in order.
    #[instrument(skip(self, video_ids), fields(count = video_ids.len()))]
    pub async fn transcribe_batch(&self, video_ids: &[String]) -> TranscribeBatch {
        let results = run_batch(video_ids.iter().cloned(), |video_id| async move {
            self.transcribe_one(&video_id).await
        })
        .await;

        let count =
            |status: TranscribeItemStatus| results.iter().filter(|r| r.status == status).count();
        let successful = count(TranscribeItemStatus::Success);
        let not_found = count(TranscribeItemStatus::NotFound);
        let no_audio = count(TranscribeItemStatus::NoAudio);
        let failed = count(TranscribeItemStatus::Failed);

        info!(
            "Transcription batch complete: {} successful, {} not found, {} without audio, {} failed",
            successful, not_found, no_audio, failed
        );

        TranscribeBatch {
            total: results.len(),
            successful,
            not_found,
            no_audio,
            failed,
            results,
        }
    }

    async fn transcribe_one(&self, video_id: &str) -> TranscribeResult {
        // Step 1: locate the video and a transcribable audio source. Chunks
        // count as a source: the original may have been removed after
        // chunking.
        let video = match self.store.get_video(video_id) {
            Ok(Some(video)) => video,
            Ok(None) => {
                return TranscribeResult::new(
                    video_id,
                    TranscribeItemStatus::NotFound,
                    "Video not found",
                    0,
                )
            }
            Err(e) => return TranscribeResult::failed(video_id, "Store lookup failed", e.to_string(), 0),
        };

        let existing_chunks = match self.store.chunks_for_video(video_id) {
            Ok(chunks) => chunks,
            Err(e) => return TranscribeResult::failed(video_id, "Store lookup failed", e.to_string(), 0),
        };

        let audio_path = video
            .audio_path
            .clone()
            .filter(|path| Path::new(path).exists());
        if audio_path.is_none() && existing_chunks.is_empty() {
            return TranscribeResult::new(
                video_id,
                TranscribeItemStatus::NoAudio,
                "Video has no audio file",
                1,
            );
        }
        let mut steps = 1;

        // Step 2: prepare chunks when the provider cannot take the whole file
        let chunks = if existing_chunks.is_empty() {
            let path = audio_path.as_deref().unwrap_or_default();
            match self.prepare_audio(&video, path).await {
                Ok(chunks) => chunks,
                Err(e) => {
                    return TranscribeResult::failed(
                        video_id,
                        "Audio preparation failed",
                        e.to_string(),
                        steps,
                    )
                }
            }
        } else {
            existing_chunks
        };
        steps += 1;

        // Step 3: transcribe, chunk by chunk when chunks exist
        let text = match self
            .transcribe_audio(video_id, audio_path.as_deref(), &chunks)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                return TranscribeResult::failed(video_id, "Transcription failed", e.to_string(), steps)
            }
        };
        steps += 1;

        // Step 4: embed; failure stores a null vector rather than voiding the text
        let (vector, row_status) = match self.embedder.embed(&text).await {
            Ok(vector) => (Some(vector), "completed"),
            Err(e) => {
                warn!("Embedding failed for {}: {}", video_id, e);
                (None, "completed_no_embedding")
            }
        };
        steps += 1;

        // Step 5: persist
        match self
            .store
            .insert_transcription(video_id, &text, vector.as_deref(), row_status)
        {
            Ok(row) => TranscribeResult {
                transcription_id: Some(row.id),
                ..TranscribeResult::new(
                    video_id,
                    TranscribeItemStatus::Success,
                    "Transcription completed",
                    steps + 1,
                )
            },
            Err(e) => TranscribeResult::failed(video_id, "Failed to persist transcription", e.to_string(), steps),
        }
    }

    /// Cut chunks when the provider cannot accept the whole file.
    async fn prepare_audio(
        &self,
        video: &Video,
        audio_path: &str,
    ) -> Result<Vec<crate::store::AudioChunk>> {
        if let Some(limit) = self.transcriber.max_file_bytes() {
            let size = std::fs::metadata(audio_path)
                .map_err(|e| LekseError::Chunking(format!("Cannot stat {}: {}", audio_path, e)))?
                .len();
            if size > limit {
                return self.chunker.ensure_chunks(&self.store, video).await;
            }
        }

        Ok(Vec::new())
    }

    /// Transcribe chunks in index order (or the whole file when there are
    /// none), retrying each piece on transient failures. A chunk that
    /// exhausts its retries voids the whole transcription.
    async fn transcribe_audio(
        &self,
        video_id: &str,
        audio_path: Option<&str>,
        chunks: &[crate::store::AudioChunk],
    ) -> Result<String> {
        let language = self.settings.transcription.language.clone();
        let policy = RetryPolicy::with_attempts(self.settings.transcription.max_retries);

        if chunks.is_empty() {
            let path = audio_path.ok_or_else(|| {
                LekseError::Transcription(format!("Video {} has no audio source", video_id))
            })?;
            info!(
                "Transcribing {} whole with the {} provider",
                video_id,
                self.transcriber.name()
            );
            return policy
                .run("transcription", || {
                    self.transcriber.transcribe(Path::new(path), &language)
                })
                .await;
        }

        info!(
            "Transcribing {} chunks for {} with the {} provider",
            chunks.len(),
            video_id,
            self.transcriber.name()
        );
        let mut parts = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let chunk_path = Path::new(&chunk.file_path);
            let text = policy
                .run("chunk transcription", || {
                    self.transcriber.transcribe(chunk_path, &language)
                })
                .await
                .map_err(|e| {
                    LekseError::Transcription(format!(
                        "Chunk {} of {} failed: {}",
                        chunk.chunk_index, video_id, e
                    ))
                })?;
            parts.push(text);
        }

        Ok(parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::*;
    use crate::pipeline::Pipeline;
    use crate::store::{DownloadStatus, NewChunk, NewVideo, Store};
    use std::collections::HashMap;
    use std::sync::Arc;

    struct Fixture {
        dir: tempfile::TempDir,
        store: Arc<Store>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                store: Arc::new(Store::in_memory(4).unwrap()),
            }
        }

        fn pipeline(&self, transcriber: StubTranscriber, embedder_fails: bool) -> Pipeline {
            let mut settings = crate::config::Settings::default();
            settings.general.storage_path = self.dir.path().to_string_lossy().to_string();
            settings.embedding.dimensions = 4;

            Pipeline::with_components(
                settings,
                self.store.clone(),
                Arc::new(StubFetcher {
                    audio_dir: self.dir.path().join("audio"),
                    failing: vec![],
                }),
                Arc::new(transcriber),
                Arc::new(StubEmbedder {
                    dimensions: 4,
                    fail: embedder_fails,
                }),
                Arc::new(StubGenerator {
                    per_video: HashMap::new(),
                    unavailable: false,
                }),
            )
        }

        /// Insert a video whose audio file exists on disk.
        fn seed_video(&self, video_id: &str) -> String {
            let audio_dir = self.dir.path().join("audio");
            std::fs::create_dir_all(&audio_dir).unwrap();
            let audio_path = audio_dir.join(format!("{}.mp3", video_id));
            std::fs::write(&audio_path, b"audio").unwrap();

            let path = audio_path.to_string_lossy().to_string();
            self.store
                .insert_video(&NewVideo {
                    video_id: video_id.to_string(),
                    title: format!("Video {}", video_id),
                    thumbnail_url: None,
                    audio_path: Some(path.clone()),
                    download_status: DownloadStatus::Completed,
                })
                .unwrap();
            path
        }

        /// Insert a video row without any audio on disk.
        fn seed_video_without_audio(&self, video_id: &str) {
            self.store
                .insert_video(&NewVideo {
                    video_id: video_id.to_string(),
                    title: format!("Video {}", video_id),
                    thumbnail_url: None,
                    audio_path: None,
                    download_status: DownloadStatus::Pending,
                })
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_transcribe_whole_file_success() {
        let fixture = Fixture::new();
        fixture.seed_video("aaaaaaaaaaa");
        let pipeline = fixture.pipeline(StubTranscriber::returning("hello from the lecture"), false);

        let batch = pipeline.transcribe_batch(&["aaaaaaaaaaa".to_string()]).await;

        assert_eq!(batch.successful, 1);
        let result = &batch.results[0];
        assert_eq!(result.status, TranscribeItemStatus::Success);
        assert_eq!(result.steps_completed, 5);
        assert_eq!(result.total_steps, 5);

        let row = fixture
            .store
            .get_transcription(result.transcription_id.unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(row.transcription_text, "hello from the lecture");
        assert_eq!(row.status, "completed");
        assert_eq!(row.embedding.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_partial_batch_statuses_preserve_order() {
        let fixture = Fixture::new();
        fixture.seed_video("aaaaaaaaaaa");
        fixture.seed_video_without_audio("ccccccccccc");
        let pipeline = fixture.pipeline(StubTranscriber::returning("text"), false);

        let batch = pipeline
            .transcribe_batch(&[
                "aaaaaaaaaaa".to_string(),
                "missing00000".to_string(),
                "ccccccccccc".to_string(),
            ])
            .await;

        assert_eq!(batch.total, 3);
        assert_eq!(batch.successful, 1);
        assert_eq!(batch.not_found, 1);
        assert_eq!(batch.no_audio, 1);
        assert_eq!(batch.failed, 0);

        assert_eq!(batch.results[0].video_id, "aaaaaaaaaaa");
        assert_eq!(batch.results[1].status, TranscribeItemStatus::NotFound);
        assert_eq!(batch.results[1].steps_completed, 0);
        assert_eq!(batch.results[2].status, TranscribeItemStatus::NoAudio);
        assert_eq!(batch.results[2].steps_completed, 1);
    }

    #[tokio::test]
    async fn test_existing_chunks_are_transcribed_in_order() {
        let fixture = Fixture::new();
        fixture.seed_video("aaaaaaaaaaa");

        // Two chunk files on disk, rows in the store
        let chunk_dir = fixture.dir.path().join("audio/chunks/aaaaaaaaaaa");
        std::fs::create_dir_all(&chunk_dir).unwrap();
        let mut new_chunks = Vec::new();
        for i in 0..2i64 {
            let path = chunk_dir.join(format!("aaaaaaaaaaa_chunk_{:03}.mp3", i));
            std::fs::write(&path, b"chunk").unwrap();
            new_chunks.push(NewChunk {
                chunk_index: i,
                file_path: path.to_string_lossy().to_string(),
                file_size: 5,
                start_ms: i * 1000,
                end_ms: (i + 1) * 1000,
            });
        }
        fixture.store.insert_chunks("aaaaaaaaaaa", &new_chunks).unwrap();

        let transcriber = StubTranscriber::returning("part");
        let pipeline = fixture.pipeline(transcriber, false);

        let batch = pipeline.transcribe_batch(&["aaaaaaaaaaa".to_string()]).await;
        assert_eq!(batch.successful, 1);

        let row = fixture
            .store
            .latest_transcription_for_video("aaaaaaaaaaa")
            .unwrap()
            .unwrap();
        // Chunk texts concatenated with a single space
        assert_eq!(row.transcription_text, "part part");
    }

    #[tokio::test]
    async fn test_chunk_failure_voids_transcription() {
        let fixture = Fixture::new();
        fixture.seed_video("aaaaaaaaaaa");

        let chunk_dir = fixture.dir.path().join("audio/chunks/aaaaaaaaaaa");
        std::fs::create_dir_all(&chunk_dir).unwrap();
        let mut new_chunks = Vec::new();
        for i in 0..2i64 {
            let path = chunk_dir.join(format!("aaaaaaaaaaa_chunk_{:03}.mp3", i));
            std::fs::write(&path, b"chunk").unwrap();
            new_chunks.push(NewChunk {
                chunk_index: i,
                file_path: path.to_string_lossy().to_string(),
                file_size: 5,
                start_ms: i * 1000,
                end_ms: (i + 1) * 1000,
            });
        }
        fixture.store.insert_chunks("aaaaaaaaaaa", &new_chunks).unwrap();

        let transcriber = StubTranscriber {
            failing_paths: vec!["chunk_001".to_string()],
            ..StubTranscriber::returning("part")
        };
        let pipeline = fixture.pipeline(transcriber, false);

        let batch = pipeline.transcribe_batch(&["aaaaaaaaaaa".to_string()]).await;
        assert_eq!(batch.failed, 1);
        assert_eq!(batch.results[0].steps_completed, 2);

        // No partial text was persisted
        assert!(fixture
            .store
            .latest_transcription_for_video("aaaaaaaaaaa")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_embedding_failure_stores_null_vector() {
        let fixture = Fixture::new();
        fixture.seed_video("aaaaaaaaaaa");
        let pipeline = fixture.pipeline(StubTranscriber::returning("text"), true);

        let batch = pipeline.transcribe_batch(&["aaaaaaaaaaa".to_string()]).await;
        assert_eq!(batch.successful, 1);
        assert_eq!(batch.results[0].steps_completed, 5);

        let row = fixture
            .store
            .latest_transcription_for_video("aaaaaaaaaaa")
            .unwrap()
            .unwrap();
        assert_eq!(row.status, "completed_no_embedding");
        assert!(row.embedding.is_none());
    }

    #[tokio::test]
    async fn test_transcribing_twice_keeps_both_rows() {
        let fixture = Fixture::new();
        fixture.seed_video("aaaaaaaaaaa");
        let pipeline = fixture.pipeline(StubTranscriber::returning("text"), false);

        pipeline.transcribe_batch(&["aaaaaaaaaaa".to_string()]).await;
        pipeline.transcribe_batch(&["aaaaaaaaaaa".to_string()]).await;

        let rows = fixture.store.transcriptions_for_video("aaaaaaaaaaa").unwrap();
        assert_eq!(rows.len(), 2);
    }
}
