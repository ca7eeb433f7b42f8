//! Local whisper CLI transcription.

use super::TranscriptionProvider;
use crate::audio::run_with_timeout;
use crate::config::TranscriptionSettings;
use crate::error::{LekseError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Transcriber that shells out to a whisper.cpp-style CLI.
///
/// Inference is single-flight: the CLI saturates whatever accelerator is
/// available, so concurrent invocations only thrash it. Calls are
/// serialized through an async mutex.
pub struct LocalWhisperTranscriber {
    whisper_cli: String,
    model_path: PathBuf,
    timeout: Duration,
    inference_lock: tokio::sync::Mutex<()>,
}

impl LocalWhisperTranscriber {
    pub fn new(settings: &TranscriptionSettings, storage_path: &Path) -> Self {
        let model_path = storage_path
            .join("models")
            .join(format!("ggml-{}.bin", settings.model));

        Self {
            whisper_cli: settings.whisper_cli.clone(),
            model_path,
            timeout: Duration::from_secs(settings.file_timeout_s),
            inference_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Path of the ggml weight file the CLI will load.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

#[async_trait]
impl TranscriptionProvider for LocalWhisperTranscriber {
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe(&self, audio_path: &Path, language: &str) -> Result<String> {
        if !audio_path.exists() {
            return Err(LekseError::Transcription(format!(
                "Audio file not found: {}",
                audio_path.display()
            )));
        }
        if !self.model_path.exists() {
            return Err(LekseError::Transcription(format!(
                "Model not found: {}",
                self.model_path.display()
            )));
        }

        let _guard = self.inference_lock.lock().await;
        info!("Running whisper CLI over {}", audio_path.display());

        let mut command = Command::new(&self.whisper_cli);
        command
            .arg("-m")
            .arg(&self.model_path)
            .arg("-f")
            .arg(audio_path)
            .arg("-l")
            .arg(language)
            .arg("--no-timestamps")
            .arg("--no-prints");

        let output = run_with_timeout(&mut command, self.timeout, "whisper-cli").await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LekseError::Transcription(format!(
                "whisper CLI failed: {}",
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let text = normalize_transcript(&text);
        if text.is_empty() {
            return Err(LekseError::Transcription(
                "whisper CLI produced no text".to_string(),
            ));
        }

        debug!("Transcribed {} characters", text.len());
        Ok(text)
    }

    fn max_file_bytes(&self) -> Option<u64> {
        None
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Collapse CLI output lines into one whitespace-normalized string.
fn normalize_transcript(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
