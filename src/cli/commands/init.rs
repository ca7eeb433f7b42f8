//! Init command - first-run setup.

use crate::cli::{preflight, Output};
use crate::config::Settings;
use crate::store::Store;
use console::style;

/// Write the default config, create directories, and verify requirements.
pub fn run_init(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Lekse Setup");
    println!();

    // Step 1: configuration file
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        Output::info(&format!("Config already exists at {}", config_path.display()));
    } else {
        settings.save_to(&config_path)?;
        Output::success(&format!("Wrote default config to {}", config_path.display()));
    }

    // Step 2: storage directories and store
    std::fs::create_dir_all(settings.audio_storage_path())?;
    std::fs::create_dir_all(settings.storage_path().join("models"))?;
    Output::success(&format!("Storage ready at {}", settings.storage_path().display()));

    let store = Store::open(&settings.database_path(), settings.embedding.dimensions)?;
    store.health_check()?;
    Output::success(&format!("Store ready at {}", settings.database_path().display()));

    // Step 3: external tools
    println!();
    let mut missing = Vec::new();
    for tool in preflight::REQUIRED_TOOLS {
        match preflight::check_tool(tool) {
            Ok(()) => println!("  {} {}", style("✓").green(), style(tool).bold()),
            Err(_) => {
                println!("  {} {} - not found", style("✗").red(), style(tool).bold());
                missing.push(*tool);
            }
        }
    }

    println!();
    if missing.is_empty() {
        Output::success("All required tools are installed.");
        Output::info("Run 'lekse serve' to start the API server.");
    } else {
        Output::warning(&format!(
            "Missing tools: {}. Install them before downloading videos.",
            missing.join(", ")
        ));
    }

    Ok(())
}
