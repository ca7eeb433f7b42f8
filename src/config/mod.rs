//! Configuration module for Lekse.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, QuestionPrompts};
pub use settings::{
    ChunkingSettings, DatabaseSettings, EmbeddingSettings, GeneralSettings, LlmSettings,
    QuestionSettings, ServerSettings, Settings, TranscriptionProvider, TranscriptionSettings,
};
