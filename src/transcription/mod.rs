//! Speech-to-text transcription.
//!
//! Two providers behind one trait: a local whisper CLI for offline
//! inference over files of any size, and a remote OpenAI-compatible API
//! with a per-request size cap that relies on the chunker for large files.

mod local;
mod remote;

pub use local::LocalWhisperTranscriber;
pub use remote::RemoteApiTranscriber;

use crate::config::{Settings, TranscriptionProvider as ProviderKind};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Trait for transcription providers.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Transcribe an audio file and return the plain text.
    ///
    /// The language hint passes through to the provider unchanged.
    async fn transcribe(&self, audio_path: &Path, language: &str) -> Result<String>;

    /// Per-request file size cap, when the provider has one.
    fn max_file_bytes(&self) -> Option<u64>;

    /// Provider name for logs and diagnostics.
    fn name(&self) -> &'static str;
}

/// Build the configured provider.
pub fn create_provider(settings: &Settings) -> Result<Arc<dyn TranscriptionProvider>> {
    let provider: Arc<dyn TranscriptionProvider> = match settings.transcription.provider {
        ProviderKind::Local => Arc::new(LocalWhisperTranscriber::new(
            &settings.transcription,
            &settings.storage_path(),
        )),
        ProviderKind::Remote => Arc::new(RemoteApiTranscriber::new(&settings.transcription)?),
    };
    Ok(provider)
}
