//! Configuration settings for Lekse.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub database: DatabaseSettings,
    pub server: ServerSettings,
    pub transcription: TranscriptionSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub llm: LlmSettings,
    pub questions: QuestionSettings,
}


/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Root directory for audio artifacts.
    pub storage_path: String,
    /// Target audio format for downloads (mp3, wav).
    pub audio_format: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            storage_path: "~/.lekse/storage".to_string(),
            audio_format: "mp3".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Path to the SQLite database file.
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "~/.lekse/lekse.db".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// CORS allow-list. An entry of "*" allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
        }
    }
}

/// Transcription provider type.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionProvider {
    /// Local whisper CLI inference (default, memory-bounded, slow).
    #[default]
    Local,
    /// Remote OpenAI-compatible transcription API (fast, 25 MB cap per request).
    Remote,
}

impl std::str::FromStr for TranscriptionProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "whisper" => Ok(TranscriptionProvider::Local),
            "remote" | "api" => Ok(TranscriptionProvider::Remote),
            _ => Err(format!("Unknown transcription provider: {}", s)),
        }
    }
}

impl std::fmt::Display for TranscriptionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptionProvider::Local => write!(f, "local"),
            TranscriptionProvider::Remote => write!(f, "remote"),
        }
    }
}

/// Transcription service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Transcription provider (local, remote).
    pub provider: TranscriptionProvider,
    /// Model identifier. For the local provider this selects the ggml
    /// weight file; for the remote provider it is sent with the request.
    pub model: String,
    /// Language hint passed through to the provider.
    pub language: String,
    /// whisper CLI binary (local provider).
    pub whisper_cli: String,
    /// Base URL of the remote transcription API (remote provider).
    pub base_url: String,
    /// Retry attempts per chunk before the transcription is voided.
    pub max_retries: u32,
    /// Wall-clock timeout for transcribing a whole file, in seconds.
    pub file_timeout_s: u64,
    /// Wall-clock timeout for transcribing a single chunk, in seconds.
    pub chunk_timeout_s: u64,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            provider: TranscriptionProvider::Local,
            model: "base".to_string(),
            language: "en".to_string(),
            whisper_cli: "whisper-cli".to_string(),
            base_url: "http://localhost:9000/v1".to_string(),
            max_retries: 3,
            file_timeout_s: 1800,
            chunk_timeout_s: 300,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Base URL of the embedding backend.
    pub base_url: String,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions. Must match the stored vector width.
    pub dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
        }
    }
}

/// Audio chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Files above this size are split before remote transcription.
    pub max_chunk_size_mb: f64,
    /// Noise floor for silence detection, in dB.
    pub silence_threshold_db: i32,
    /// Minimum silence duration to register a split candidate, in seconds.
    pub min_silence_duration_s: f64,
    /// Remove the original audio file once chunks are persisted.
    pub delete_original_after_chunking: bool,
    /// Wall-clock timeout per FFmpeg invocation, in seconds.
    pub ffmpeg_timeout_s: u64,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_chunk_size_mb: 25.0,
            silence_threshold_db: -35,
            min_silence_duration_s: 0.3,
            delete_original_after_chunking: false,
            ffmpeg_timeout_s: 300,
        }
    }
}

/// LLM backend settings (question generation).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Base URL of the Ollama-compatible backend.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Request timeout in seconds.
    pub request_timeout_s: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1:8b".to_string(),
            request_timeout_s: 300,
        }
    }
}

/// Question generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionSettings {
    /// Question count when the request does not specify one.
    pub default_count: u32,
    /// Character budget for transcription text included in the prompt,
    /// shared equally across the requested videos.
    pub prompt_char_budget: usize,
    /// Directory for custom prompt overrides.
    pub custom_prompt_dir: Option<String>,
}

impl Default for QuestionSettings {
    fn default() -> Self {
        Self {
            default_count: 10,
            prompt_char_budget: 24_000,
            custom_prompt_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            settings.validate()?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::LekseError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lekse")
            .join("config.toml")
    }

    fn validate(&self) -> crate::error::Result<()> {
        if self.embedding.dimensions == 0 {
            return Err(crate::error::LekseError::Config(
                "embedding.dimensions must be positive".to_string(),
            ));
        }
        if self.chunking.max_chunk_size_mb <= 0.0 {
            return Err(crate::error::LekseError::Config(
                "chunking.max_chunk_size_mb must be positive".to_string(),
            ));
        }
        match self.general.audio_format.as_str() {
            "mp3" | "wav" => Ok(()),
            other => Err(crate::error::LekseError::Config(format!(
                "general.audio_format must be mp3 or wav, got {}",
                other
            ))),
        }
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded storage root path.
    pub fn storage_path(&self) -> PathBuf {
        Self::expand_path(&self.general.storage_path)
    }

    /// Directory for original audio files.
    pub fn audio_storage_path(&self) -> PathBuf {
        self.storage_path().join("audio")
    }

    /// Directory for chunk files of a given video.
    pub fn chunk_storage_path(&self, video_id: &str) -> PathBuf {
        self.audio_storage_path().join("chunks").join(video_id)
    }

    /// Get the expanded database file path.
    pub fn database_path(&self) -> PathBuf {
        Self::expand_path(&self.database.url)
    }

    /// Chunking threshold in bytes.
    pub fn max_chunk_size_bytes(&self) -> u64 {
        (self.chunking.max_chunk_size_mb * 1024.0 * 1024.0) as u64
    }
}
