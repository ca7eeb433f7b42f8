//! Config command - inspect configuration.

use crate::cli::Output;
use crate::config::Settings;

/// Print the current configuration as TOML.
pub fn run_config_show(settings: &Settings) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(settings)?;
    Output::header("Current Configuration");
    println!();
    println!("{}", rendered);
    Ok(())
}

/// Print the configuration file path.
pub fn run_config_path() {
    println!("{}", Settings::default_config_path().display());
}
