//! Serve command - run the HTTP API server.

use crate::cli::Output;
use crate::config::Settings;
use crate::server;

/// Run the HTTP API server until shutdown.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    Output::header("Lekse API Server");
    println!();
    Output::kv("Store", &settings.database_path().display().to_string());
    Output::kv("Storage", &settings.storage_path().display().to_string());
    Output::kv(
        "Transcription",
        &format!(
            "{} ({})",
            settings.transcription.provider, settings.transcription.model
        ),
    );
    Output::kv("LLM", &format!("{} @ {}", settings.llm.model, settings.llm.base_url));
    println!();
    Output::success(&format!("Listening on http://{}:{}", host, port));
    Output::info("Press Ctrl+C to stop the server.");
    println!();

    server::run(host, port, settings).await?;

    Ok(())
}
