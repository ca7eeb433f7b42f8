//! Question generation against an Ollama-style chat backend.

use super::{extract_json_array, validate_items, GeneratedQuestion, QuestionProvider, TranscriptInput};
use crate::config::{Prompts, Settings};
use crate::error::{LekseError, Result};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument};

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f64,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

/// Question generator calling an `/api/chat` backend.
pub struct LlmQuestionGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    prompts: Prompts,
    policy: RetryPolicy,
    prompt_char_budget: usize,
}

impl LlmQuestionGenerator {
    pub fn new(settings: &Settings, prompts: Prompts) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.llm.request_timeout_s))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.llm.base_url.trim_end_matches('/').to_string(),
            model: settings.llm.model.clone(),
            prompts,
            // Up to 2 retries on transient backend failures
            policy: RetryPolicy::with_attempts(3),
            prompt_char_budget: settings.questions.prompt_char_budget,
        })
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            stream: false,
            options: ChatOptions { temperature: 0.3 },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| LekseError::LlmUnavailable(format!("Malformed chat response: {}", e)))?;

        Ok(body.message.content)
    }
}

#[async_trait]
impl QuestionProvider for LlmQuestionGenerator {
    #[instrument(skip(self, transcripts), fields(videos = transcripts.len()))]
    async fn generate(
        &self,
        transcripts: &[TranscriptInput],
        count: u32,
    ) -> Result<Vec<GeneratedQuestion>> {
        let transcript_block = format_transcripts(transcripts, self.prompt_char_budget);

        let mut vars = HashMap::new();
        vars.insert("count".to_string(), count.to_string());
        vars.insert("transcripts".to_string(), transcript_block);
        let user = Prompts::render(&self.prompts.questions.user, &vars);
        let system = self.prompts.questions.system.clone();

        info!("Requesting {} questions from {}", count, self.model);

        let content = self
            .policy
            .run("LLM chat", || self.chat(&system, &user))
            .await
            .map_err(|e| match e {
                decode @ LekseError::LlmUnavailable(_) => decode,
                other => LekseError::LlmUnavailable(other.to_string()),
            })?;

        let allowed: std::collections::HashSet<String> =
            transcripts.iter().map(|t| t.video_id.clone()).collect();

        let mut questions = match extract_json_array(&content) {
            Some(items) => validate_items(&items, &allowed),
            None => Vec::new(),
        };

        // The model was asked for exactly `count`; cap any overshoot and
        // accept undershoot as-is.
        questions.truncate(count as usize);

        debug!("Parsed {} valid questions", questions.len());
        Ok(questions)
    }

    async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Lay out per-video transcript sections within a character budget.
///
/// Each video gets an equal share; longer transcripts are cut from the
/// end. Section labels carry the video id the model must echo back.
fn format_transcripts(transcripts: &[TranscriptInput], char_budget: usize) -> String {
    if transcripts.is_empty() {
        return String::new();
    }

    let share = (char_budget / transcripts.len()).max(1);

    transcripts
        .iter()
        .map(|t| {
            let text = match t.text.char_indices().nth(share) {
                Some((byte_index, _)) => &t.text[..byte_index],
                None => &t.text,
            };
            format!("[video {}]\n{}", t.video_id, text.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(video_id: &str, text: &str) -> TranscriptInput {
        TranscriptInput {
            video_id: video_id.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_format_labels_each_video() {
        let block = format_transcripts(
            &[input("aaaaaaaaaaa", "first text"), input("bbbbbbbbbbb", "second text")],
            1000,
        );
        assert!(block.contains("[video aaaaaaaaaaa]\nfirst text"));
        assert!(block.contains("[video bbbbbbbbbbb]\nsecond text"));
    }

    #[test]
    fn test_format_shares_budget_equally() {
        let long_a = "a".repeat(500);
        let long_b = "b".repeat(500);
        let block = format_transcripts(&[input("aaaaaaaaaaa", &long_a), input("bbbbbbbbbbb", &long_b)], 200);

        // 100 chars of text each, plus the 11-char id in each label
        let a_count = block.chars().filter(|c| *c == 'a').count();
        let b_count = block.chars().filter(|c| *c == 'b').count();
        assert_eq!(a_count, 111);
        assert_eq!(b_count, 111);
    }

    #[test]
    fn test_format_empty_input() {
        assert_eq!(format_transcripts(&[], 1000), "");
    }
}
