//! Remote transcription over an OpenAI-compatible API.

use super::TranscriptionProvider;
use crate::config::TranscriptionSettings;
use crate::error::{LekseError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

/// Per-request file size limit imposed by hosted transcription APIs.
pub const REMOTE_MAX_FILE_BYTES: u64 = 25 * 1024 * 1024;

/// Transcriber that posts audio to a remote `/audio/transcriptions`
/// endpoint. Files above the request cap must be chunked first.
pub struct RemoteApiTranscriber {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl RemoteApiTranscriber {
    pub fn new(settings: &TranscriptionSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.chunk_timeout_s))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
        })
    }
}

#[async_trait]
impl TranscriptionProvider for RemoteApiTranscriber {
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe(&self, audio_path: &Path, language: &str) -> Result<String> {
        let file_size = std::fs::metadata(audio_path)
            .map_err(|e| {
                LekseError::Transcription(format!("Cannot stat {}: {}", audio_path.display(), e))
            })?
            .len();

        if file_size > REMOTE_MAX_FILE_BYTES {
            return Err(LekseError::Transcription(format!(
                "File is {} bytes; the remote API accepts at most {} — chunk it first",
                file_size, REMOTE_MAX_FILE_BYTES
            )));
        }

        let file_bytes = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(file_bytes).file_name(file_name),
            )
            .text("model", self.model.clone())
            .text("language", language.to_string())
            .text("response_format", "text");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let text = response.text().await?;
        let text = text.trim().to_string();

        if text.is_empty() {
            return Err(LekseError::Transcription(
                "Remote API returned empty transcription".to_string(),
            ));
        }

        debug!("Transcribed {} characters", text.len());
        Ok(text)
    }

    fn max_file_bytes(&self) -> Option<u64> {
        Some(REMOTE_MAX_FILE_BYTES)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranscriptionSettings;

    #[test]
    fn test_base_url_is_normalized() {
        let settings = TranscriptionSettings {
            base_url: "http://localhost:9000/v1/".to_string(),
            ..Default::default()
        };
        let transcriber = RemoteApiTranscriber::new(&settings).unwrap();
        assert_eq!(transcriber.base_url, "http://localhost:9000/v1");
        assert_eq!(transcriber.max_file_bytes(), Some(REMOTE_MAX_FILE_BYTES));
    }
}
