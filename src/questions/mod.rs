//! LLM-backed question generation.
//!
//! One prompt is built over the transcriptions of the requested videos and
//! sent to the LLM backend; the structured response is parsed, validated,
//! and persisted as a Generation with its Questions.

mod generator;
mod parse;

pub use generator::LlmQuestionGenerator;
pub use parse::{extract_json_array, validate_items};

use crate::error::Result;
use crate::store::{Difficulty, QuestionType};
use async_trait::async_trait;
use serde::Deserialize;

/// A question as parsed from the LLM response.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedQuestion {
    pub question_text: String,
    pub answer: Option<String>,
    pub context: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub question_type: Option<QuestionType>,
    pub video_id: String,
}

/// A video's transcription text, keyed by external id, as prompt input.
#[derive(Debug, Clone)]
pub struct TranscriptInput {
    pub video_id: String,
    pub text: String,
}

/// Capability to generate questions from transcriptions.
#[async_trait]
pub trait QuestionProvider: Send + Sync {
    /// Generate up to `count` questions over the given transcripts.
    ///
    /// Returns the validated questions in response order; fewer than
    /// `count` is acceptable. Fails with `LlmUnavailable` when the backend
    /// cannot be reached after retries.
    async fn generate(
        &self,
        transcripts: &[TranscriptInput],
        count: u32,
    ) -> Result<Vec<GeneratedQuestion>>;

    /// Whether the backend currently answers requests.
    async fn check_health(&self) -> bool;
}
