//! Remote HTTP embedder (Ollama-style API).

use super::{normalize, Embedder};
use crate::config::EmbeddingSettings;
use crate::error::{LekseError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Inputs longer than this are truncated from the end before embedding;
/// the caller is not informed.
const MAX_INPUT_CHARS: usize = 8_000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embedder backed by an `/api/embeddings` endpoint.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl RemoteEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            dimensions: settings.dimensions,
        })
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let truncated = truncate_chars(text, MAX_INPUT_CHARS);

        let request = EmbeddingRequest {
            model: &self.model,
            prompt: truncated,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LekseError::Embedding(format!("Malformed embedding response: {}", e)))?;

        if body.embedding.len() != self.dimensions {
            return Err(LekseError::Embedding(format!(
                "Model returned {} dimensions, expected {}",
                body.embedding.len(),
                self.dimensions
            )));
        }

        let vector = normalize(body.embedding)
            .ok_or_else(|| LekseError::Embedding("Model returned a zero vector".to_string()))?;

        debug!("Generated {}-dimensional embedding", vector.len());
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Keep the first `max_chars` characters, respecting char boundaries.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        // Multi-byte characters are not split
        assert_eq!(truncate_chars("døgnåpent", 4), "døgn");
    }

    #[test]
    fn test_embedder_reports_dimensions() {
        let settings = EmbeddingSettings {
            dimensions: 384,
            ..Default::default()
        };
        let embedder = RemoteEmbedder::new(&settings).unwrap();
        assert_eq!(embedder.dimensions(), 384);
    }
}
