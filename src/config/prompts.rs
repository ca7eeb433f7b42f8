//! Prompt templates for Lekse.
//!
//! Prompts can be customized by placing a TOML file in the custom prompts
//! directory configured under `[questions] custom_prompt_dir`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub questions: QuestionPrompts,
}


/// Prompts for question generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionPrompts {
    pub system: String,
    pub user: String,
}

impl Default for QuestionPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an educational content expert. You create study questions from lecture transcripts.

Strict rules:
1. Use ONLY information present in the transcripts provided - never your own knowledge
2. Do not copy transcript sentences verbatim as questions; test understanding instead
3. In the "context" field, quote the transcript passage that supports the question
4. In the "answer" field, write a clear, self-contained answer grounded in the transcript
5. Respond with a valid JSON array only - no prose, no markdown, no explanations
6. If a transcript is empty or insufficient, generate fewer questions rather than inventing content"#
                .to_string(),

            user: r#"Read the following lecture transcripts and create exactly {{count}} educational questions.

Each transcript is labeled with the video id it came from. Spread questions across the videos where the material allows.

{{transcripts}}

Respond with a JSON array of exactly {{count}} objects. Each object must have these fields:
- "question_text": the question (required, non-empty)
- "answer": a comprehensive answer based on the transcript
- "context": the supporting quote from the transcript
- "difficulty": one of "easy", "medium", "hard"
- "question_type": one of "factual", "conceptual", "analytical"
- "video_id": the id of the video the question is drawn from

Example response:
[
  {"question_text": "...", "answer": "...", "context": "...", "difficulty": "medium", "question_type": "conceptual", "video_id": "dQw4w9WgXcQ"}
]"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts, overlaying any custom TOML found in `custom_dir`.
    pub fn load(custom_dir: Option<&str>) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(dir) = custom_dir {
            let path = Path::new(dir).join("questions.toml");
            if path.exists() {
                let content = std::fs::read_to_string(&path)?;
                let custom: QuestionPrompts = toml::from_str(&content)?;
                prompts.questions = custom;
            }
        }

        Ok(prompts)
    }

    /// Render a template, replacing `{{name}}` placeholders.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut out = template.to_string();
        for (name, value) in vars {
            out = out.replace(&format!("{{{{{}}}}}", name), value);
        }
        out
    }
}
