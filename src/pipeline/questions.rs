//! Batch question generation.

use super::Pipeline;
use crate::error::Result;
use crate::questions::TranscriptInput;
use crate::store::NewQuestion;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, instrument};

/// Requested counts are clamped into this range.
pub const MIN_QUESTION_COUNT: i64 = 1;
pub const MAX_QUESTION_COUNT: i64 = 50;

/// Per-video outcome of a generation batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerateItemStatus {
    Success,
    NoTranscription,
    Failed,
}

/// Result for a single video id.
#[derive(Debug, Serialize)]
pub struct GenerateResult {
    pub video_id: String,
    pub status: GenerateItemStatus,
    pub message: String,
    pub question_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Generation batch envelope.
#[derive(Debug, Serialize)]
pub struct GenerateBatch {
    pub results: Vec<GenerateResult>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub no_transcription: usize,
    pub total_questions: usize,
    pub generation_id: i64,
}

impl Pipeline {
    /// Generate questions over a batch of videos with one LLM call.
    ///
    /// The most recent transcription of each video feeds a single prompt;
    /// parsed questions are persisted under a new Generation. An LLM
    /// failure after retries aborts the whole batch with `LlmUnavailable`
    /// and creates nothing.
    #[instrument(skip(self, video_ids), fields(videos = video_ids.len(), requested = requested_count))]
    pub async fn generate_batch(
        &self,
        video_ids: &[String],
        requested_count: i64,
    ) -> Result<GenerateBatch> {
        let count = requested_count.clamp(MIN_QUESTION_COUNT, MAX_QUESTION_COUNT) as u32;

        // Most recent transcription per video; videos without one are
        // reported but don't abort the batch
        let mut transcripts = Vec::new();
        let mut missing: HashSet<&str> = HashSet::new();
        for video_id in video_ids {
            match self.store.latest_transcription_for_video(video_id)? {
                Some(transcription) => transcripts.push(TranscriptInput {
                    video_id: video_id.clone(),
                    text: transcription.transcription_text,
                }),
                None => {
                    missing.insert(video_id.as_str());
                }
            }
        }

        let questions = if transcripts.is_empty() {
            info!("No transcriptions available; skipping LLM call");
            Vec::new()
        } else {
            self.generator.generate(&transcripts, count).await?
        };

        // Persist: the Generation records the full requested id list even
        // when some videos contributed nothing
        let generation = self.store.insert_generation(video_ids)?;
        let new_questions: Vec<NewQuestion> = questions
            .iter()
            .map(|q| NewQuestion {
                video_id: q.video_id.clone(),
                question_text: q.question_text.clone(),
                answer: q.answer.clone(),
                context: q.context.clone(),
                difficulty: q.difficulty,
                question_type: q.question_type,
            })
            .collect();
        let inserted = self.store.insert_questions(generation.id, &new_questions)?;

        let mut per_video: HashMap<&str, usize> = HashMap::new();
        for question in &inserted {
            *per_video.entry(question.video_id.as_str()).or_default() += 1;
        }

        let results: Vec<GenerateResult> = video_ids
            .iter()
            .map(|video_id| {
                if missing.contains(video_id.as_str()) {
                    GenerateResult {
                        video_id: video_id.clone(),
                        status: GenerateItemStatus::NoTranscription,
                        message: "No transcription available".to_string(),
                        question_count: 0,
                        error: Some("Video must be transcribed first".to_string()),
                    }
                } else {
                    match per_video.get(video_id.as_str()) {
                        Some(n) => GenerateResult {
                            video_id: video_id.clone(),
                            status: GenerateItemStatus::Success,
                            message: format!("Generated {} questions", n),
                            question_count: *n,
                            error: None,
                        },
                        None => GenerateResult {
                            video_id: video_id.clone(),
                            status: GenerateItemStatus::Failed,
                            message: "No valid questions referenced this video".to_string(),
                            question_count: 0,
                            error: None,
                        },
                    }
                }
            })
            .collect();

        let successful = results
            .iter()
            .filter(|r| r.status == GenerateItemStatus::Success)
            .count();
        let failed = results
            .iter()
            .filter(|r| r.status == GenerateItemStatus::Failed)
            .count();
        let no_transcription = results
            .iter()
            .filter(|r| r.status == GenerateItemStatus::NoTranscription)
            .count();

        info!(
            "Generation {} complete: {} questions over {} videos ({} without transcription)",
            generation.id,
            inserted.len(),
            successful,
            no_transcription
        );

        Ok(GenerateBatch {
            total: results.len(),
            successful,
            failed,
            no_transcription,
            total_questions: inserted.len(),
            generation_id: generation.id,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LekseError;
    use crate::pipeline::test_support::*;
    use crate::store::{DownloadStatus, NewVideo, Store};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn seeded_store() -> Arc<Store> {
        let store = Arc::new(Store::in_memory(4).unwrap());
        for id in ["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"] {
            store
                .insert_video(&NewVideo {
                    video_id: id.to_string(),
                    title: format!("Video {}", id),
                    thumbnail_url: None,
                    audio_path: None,
                    download_status: DownloadStatus::Completed,
                })
                .unwrap();
        }
        // Two of three videos have transcriptions
        store
            .insert_transcription("aaaaaaaaaaa", "a lecture about graphs", None, "completed")
            .unwrap();
        store
            .insert_transcription("bbbbbbbbbbb", "a lecture about trees", None, "completed")
            .unwrap();
        store
    }

    fn pipeline_with(store: Arc<Store>, generator: StubGenerator) -> crate::pipeline::Pipeline {
        let mut settings = crate::config::Settings::default();
        settings.embedding.dimensions = 4;
        crate::pipeline::Pipeline::with_components(
            settings,
            store,
            Arc::new(StubFetcher {
                audio_dir: std::env::temp_dir(),
                failing: vec![],
            }),
            Arc::new(StubTranscriber::returning("text")),
            Arc::new(StubEmbedder {
                dimensions: 4,
                fail: false,
            }),
            Arc::new(generator),
        )
    }

    #[tokio::test]
    async fn test_generate_batch_mixed_statuses() {
        let store = seeded_store();
        let generator = StubGenerator {
            per_video: HashMap::from([("aaaaaaaaaaa".to_string(), 2)]),
            unavailable: false,
        };
        let pipeline = pipeline_with(store.clone(), generator);

        let batch = pipeline
            .generate_batch(
                &[
                    "aaaaaaaaaaa".to_string(),
                    "bbbbbbbbbbb".to_string(),
                    "ccccccccccc".to_string(),
                ],
                10,
            )
            .await
            .unwrap();

        assert_eq!(batch.total, 3);
        assert_eq!(batch.successful, 1);
        assert_eq!(batch.failed, 1); // transcribed but never referenced
        assert_eq!(batch.no_transcription, 1);
        assert_eq!(batch.total_questions, 2);

        // Input order is preserved
        assert_eq!(batch.results[0].status, GenerateItemStatus::Success);
        assert_eq!(batch.results[1].status, GenerateItemStatus::Failed);
        assert_eq!(batch.results[2].status, GenerateItemStatus::NoTranscription);

        // The generation records the full requested list
        let generation = store.get_generation(batch.generation_id).unwrap().unwrap();
        assert_eq!(generation.video_ids.len(), 3);
        assert_eq!(generation.question_count, 2);

        // order_index is contiguous from 0
        let questions = store.questions_for_generation(batch.generation_id).unwrap();
        let indexes: Vec<i64> = questions.iter().map(|q| q.order_index).collect();
        assert_eq!(indexes, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_llm_failure_creates_no_generation() {
        let store = seeded_store();
        let generator = StubGenerator {
            per_video: HashMap::new(),
            unavailable: true,
        };
        let pipeline = pipeline_with(store.clone(), generator);

        let err = pipeline
            .generate_batch(&["aaaaaaaaaaa".to_string()], 5)
            .await
            .unwrap_err();
        assert!(matches!(err, LekseError::LlmUnavailable(_)));

        let (generations, total) = store.list_generations(0, 10).unwrap();
        assert!(generations.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_no_transcriptions_skips_llm() {
        let store = seeded_store();
        // Backend is down, but it must not be called at all
        let generator = StubGenerator {
            per_video: HashMap::new(),
            unavailable: true,
        };
        let pipeline = pipeline_with(store.clone(), generator);

        let batch = pipeline
            .generate_batch(&["ccccccccccc".to_string()], 5)
            .await
            .unwrap();

        assert_eq!(batch.no_transcription, 1);
        assert_eq!(batch.total_questions, 0);
        let generation = store.get_generation(batch.generation_id).unwrap().unwrap();
        assert_eq!(generation.question_count, 0);
    }

    #[tokio::test]
    async fn test_count_is_clamped() {
        let store = seeded_store();
        let generator = StubGenerator {
            per_video: HashMap::from([("aaaaaaaaaaa".to_string(), 60)]),
            unavailable: false,
        };
        let pipeline = pipeline_with(store.clone(), generator);

        let batch = pipeline
            .generate_batch(&["aaaaaaaaaaa".to_string()], 500)
            .await
            .unwrap();

        // 500 requested, clamped to 50; the stub honors the cap
        assert_eq!(batch.total_questions, 50);
    }
}
