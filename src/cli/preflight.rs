//! Pre-flight checks for external tools.
//!
//! Validates that the subprocesses the pipeline depends on are installed
//! before starting operations that would otherwise fail midway.

use crate::error::{LekseError, Result};
use std::process::Command;

/// Tools the download/chunking pipeline always needs.
pub const REQUIRED_TOOLS: &[&str] = &["yt-dlp", "ffmpeg", "ffprobe"];

/// Check that every required tool responds.
pub fn check_required_tools() -> Result<()> {
    for tool in REQUIRED_TOOLS {
        check_tool(tool)?;
    }
    Ok(())
}

/// Check if an external tool is available.
pub fn check_tool(name: &str) -> Result<()> {
    // ffmpeg/ffprobe use -version (single dash), others use --version
    let version_arg = match name {
        "ffmpeg" | "ffprobe" => "-version",
        _ => "--version",
    };
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(LekseError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(LekseError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(LekseError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
