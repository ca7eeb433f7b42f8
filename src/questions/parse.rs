//! Parsing of structured LLM responses.
//!
//! Models add prose, markdown fences, and half-followed instructions
//! around the JSON they were asked for. Extraction is therefore layered:
//! direct parse, fence stripping, then a string-aware scan for the first
//! balanced JSON array.

use super::GeneratedQuestion;
use crate::store::{Difficulty, QuestionType};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Extract the first balanced JSON array from a response body.
pub fn extract_json_array(text: &str) -> Option<Vec<serde_json::Value>> {
    // Strategy 1: the whole body is the array
    if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(text.trim()) {
        return Some(items);
    }

    // Strategy 2: fenced block (```json ... ``` or ``` ... ```)
    if let Some(inner) = strip_code_fence(text) {
        if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(inner.trim()) {
            return Some(items);
        }
    }

    // Strategy 3: scan for the first balanced top-level array
    let bytes: Vec<char> = text.chars().collect();
    let mut search_from = 0;
    while let Some(start) = bytes[search_from..].iter().position(|c| *c == '[') {
        let start = search_from + start;
        if let Some(end) = find_matching_bracket(&bytes, start) {
            let candidate: String = bytes[start..=end].iter().collect();
            if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(&candidate) {
                return Some(items);
            }
        }
        search_from = start + 1;
    }

    warn!("No valid JSON array found in LLM response");
    None
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip an optional language tag on the fence line
    let body_start = after_fence.find('\n')?;
    let body = &after_fence[body_start + 1..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// Index of the `]` closing the `[` at `start`, respecting JSON strings.
fn find_matching_bracket(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in chars[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if *c == '\\' {
                escaped = true;
            } else if *c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Validate parsed items against the request.
///
/// Keeps items with a non-empty `question_text` and a `video_id` from the
/// requested set; out-of-enum difficulty or type values become null;
/// anything else malformed is dropped.
pub fn validate_items(
    items: &[serde_json::Value],
    allowed_video_ids: &HashSet<String>,
) -> Vec<GeneratedQuestion> {
    let mut valid = Vec::with_capacity(items.len());

    for item in items {
        let Some(object) = item.as_object() else {
            debug!("Dropping non-object item");
            continue;
        };

        let question_text = object
            .get("question_text")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or_default();
        if question_text.is_empty() {
            debug!("Dropping item without question_text");
            continue;
        }

        let Some(video_id) = object.get("video_id").and_then(|v| v.as_str()) else {
            debug!("Dropping item without video_id");
            continue;
        };
        if !allowed_video_ids.contains(video_id) {
            debug!("Dropping item for unrequested video {}", video_id);
            continue;
        }

        let difficulty = object
            .get("difficulty")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<Difficulty>().ok());
        let question_type = object
            .get("question_type")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<QuestionType>().ok());

        valid.push(GeneratedQuestion {
            question_text: question_text.to_string(),
            answer: object
                .get("answer")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            context: object
                .get("context")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            difficulty,
            question_type,
            video_id: video_id.to_string(),
        });
    }

    valid
}
