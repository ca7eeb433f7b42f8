//! Doctor command - verify system requirements and backend reachability.

use crate::cli::{preflight, Output};
use crate::config::{Prompts, Settings, TranscriptionProvider};
use crate::questions::{LlmQuestionGenerator, QuestionProvider};
use crate::store::Store;
use crate::transcription::LocalWhisperTranscriber;
use console::style;

/// Check result for a single item.
struct CheckResult {
    name: String,
    ok: bool,
    message: String,
    hint: Option<String>,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            ok: true,
            message: message.to_string(),
            hint: None,
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            ok: false,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = if self.ok {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);
        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all doctor checks and report.
pub async fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Lekse Doctor");
    println!();

    let mut results = Vec::new();

    // External tools
    for tool in preflight::REQUIRED_TOOLS {
        results.push(match preflight::check_tool(tool) {
            Ok(()) => CheckResult::ok(tool, "installed"),
            Err(e) => CheckResult::error(tool, &e.to_string(), "Install it and ensure it's in your PATH"),
        });
    }

    // Store
    results.push(
        match Store::open(&settings.database_path(), settings.embedding.dimensions) {
            Ok(store) => match store.health_check() {
                Ok(()) => CheckResult::ok("store", "reachable"),
                Err(e) => CheckResult::error("store", &e.to_string(), "Check the database file permissions"),
            },
            Err(e) => CheckResult::error("store", &e.to_string(), "Check [database] url in the config"),
        },
    );

    // Transcription provider
    match settings.transcription.provider {
        TranscriptionProvider::Local => {
            let transcriber = LocalWhisperTranscriber::new(&settings.transcription, &settings.storage_path());
            results.push(match preflight::check_tool(&settings.transcription.whisper_cli) {
                Ok(()) => CheckResult::ok("whisper-cli", "installed"),
                Err(e) => CheckResult::error(
                    "whisper-cli",
                    &e.to_string(),
                    "Install whisper.cpp or switch [transcription] provider to \"remote\"",
                ),
            });
            results.push(if transcriber.model_path().exists() {
                CheckResult::ok("whisper model", &transcriber.model_path().display().to_string())
            } else {
                CheckResult::error(
                    "whisper model",
                    &format!("{} not found", transcriber.model_path().display()),
                    "Download the ggml weights into <storage>/models/",
                )
            });
        }
        TranscriptionProvider::Remote => {
            results.push(CheckResult::ok(
                "transcription API",
                &format!("configured at {}", settings.transcription.base_url),
            ));
        }
    }

    // LLM backend
    let generator = LlmQuestionGenerator::new(settings, Prompts::default())?;
    results.push(if generator.check_health().await {
        CheckResult::ok("llm backend", &format!("{} reachable", settings.llm.base_url))
    } else {
        CheckResult::error(
            "llm backend",
            &format!("{} not reachable", settings.llm.base_url),
            "Start the backend or fix [llm] base_url",
        )
    });

    for result in &results {
        result.print();
    }
    println!();

    let failures = results.iter().filter(|r| !r.ok).count();
    if failures == 0 {
        Output::success("All checks passed.");
    } else {
        Output::warning(&format!("{} check(s) failed.", failures));
    }

    Ok(())
}
