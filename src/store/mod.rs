//! Durable persistence for Lekse.
//!
//! One SQLite database owns every entity: videos, audio chunks,
//! transcriptions, generations, and questions. Foreign keys cascade at the
//! database level; file artifacts are deleted by the caller after the rows
//! are gone.

mod sqlite;

pub use sqlite::Store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Download lifecycle of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
}

impl std::str::FromStr for DownloadStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DownloadStatus::Pending),
            "downloading" => Ok(DownloadStatus::Downloading),
            "completed" => Ok(DownloadStatus::Completed),
            "failed" => Ok(DownloadStatus::Failed),
            _ => Err(format!("Unknown download status: {}", s)),
        }
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A YouTube video known to the system.
#[derive(Debug, Clone, Serialize)]
pub struct Video {
    pub id: i64,
    /// 11-character external id, the business key.
    pub video_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    /// Absolute path of the downloaded audio, once materialized.
    pub audio_path: Option<String>,
    pub download_status: DownloadStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a video row.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub video_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub audio_path: Option<String>,
    pub download_status: DownloadStatus,
}

/// A contiguous slice of a video's original audio file.
#[derive(Debug, Clone, Serialize)]
pub struct AudioChunk {
    pub id: i64,
    pub video_id: String,
    /// 0-based position within the video.
    pub chunk_index: i64,
    pub file_path: String,
    pub file_size: i64,
    pub start_ms: i64,
    pub end_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a chunk row.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub chunk_index: i64,
    pub file_path: String,
    pub file_size: i64,
    pub start_ms: i64,
    pub end_ms: i64,
}

/// A transcription of a video, with an optional embedding vector.
#[derive(Debug, Clone, Serialize)]
pub struct Transcription {
    pub id: i64,
    pub video_id: String,
    pub transcription_text: String,
    /// Unit-norm vector, or None when embedding failed.
    #[serde(skip_serializing)]
    pub embedding: Option<Vec<f32>>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Transcription {
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

/// One batch question-generation event.
#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    pub id: i64,
    /// Source video external ids, in request order.
    pub video_ids: Vec<String>,
    pub question_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Question difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(format!("Unknown difficulty: {}", s)),
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        write!(f, "{}", s)
    }
}

/// Question category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Factual,
    Conceptual,
    Analytical,
}

impl std::str::FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "factual" => Ok(QuestionType::Factual),
            "conceptual" => Ok(QuestionType::Conceptual),
            "analytical" => Ok(QuestionType::Analytical),
            _ => Err(format!("Unknown question type: {}", s)),
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QuestionType::Factual => "factual",
            QuestionType::Conceptual => "conceptual",
            QuestionType::Analytical => "analytical",
        };
        write!(f, "{}", s)
    }
}

/// An AI-generated educational question.
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: i64,
    pub generation_id: i64,
    /// Source video external id, denormalized for filtering.
    pub video_id: String,
    pub question_text: String,
    pub answer: Option<String>,
    pub context: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub question_type: Option<QuestionType>,
    pub order_index: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a question row. `order_index` is assigned from
/// list position at insert.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub video_id: String,
    pub question_text: String,
    pub answer: Option<String>,
    pub context: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub question_type: Option<QuestionType>,
}

/// Partial update of a question. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionUpdate {
    pub question_text: Option<String>,
    pub answer: Option<String>,
    pub context: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub question_type: Option<QuestionType>,
    pub order_index: Option<i64>,
}

impl QuestionUpdate {
    pub fn is_empty(&self) -> bool {
        self.question_text.is_none()
            && self.answer.is_none()
            && self.context.is_none()
            && self.difficulty.is_none()
            && self.question_type.is_none()
            && self.order_index.is_none()
    }
}

/// Everything removed by a video delete, so the caller can clean up files.
#[derive(Debug)]
pub struct DeletedVideo {
    pub video: Video,
    /// Chunk file paths that belonged to the video.
    pub chunk_paths: Vec<String>,
}

/// Serialize an embedding to little-endian f32 bytes.
pub(crate) fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize an embedding from little-endian f32 bytes.
pub(crate) fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| {
            let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
            f32::from_le_bytes(arr)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_byte_round_trip() {
        let vector = vec![1.0f32, -0.5, 0.25, 1e-7];
        let bytes = embedding_to_bytes(&vector);
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes_to_embedding(&bytes), vector);
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("brutal".parse::<Difficulty>().is_err());
        assert_eq!(
            "Conceptual".parse::<QuestionType>().unwrap(),
            QuestionType::Conceptual
        );
        assert!("rhetorical".parse::<QuestionType>().is_err());
    }
}
