//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available
//! before starting a run that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{Result, TolkError};
use std::process::Command;

/// Run pre-flight checks for a pipeline run.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(settings: &Settings) -> Result<()> {
    check_api_key(settings)?;
    // yt-dlp shells out to ffmpeg for audio extraction.
    check_tool("yt-dlp")?;
    check_tool("ffmpeg")?;
    check_tool("whisper-cli")?;
    check_model(settings)?;
    Ok(())
}

/// Check that an Anthropic API key is configured.
fn check_api_key(settings: &Settings) -> Result<()> {
    match settings.api_key() {
        Some(_) => Ok(()),
        None => Err(TolkError::Config(
            "ANTHROPIC_API_KEY not set. Set it with: export ANTHROPIC_API_KEY='sk-ant-...'"
                .to_string(),
        )),
    }
}

/// Check that the configured whisper model file exists.
fn check_model(settings: &Settings) -> Result<()> {
    let path = settings.model_path();
    if path.is_file() {
        Ok(())
    } else {
        Err(TolkError::ModelLoad(format!(
            "model file not found: {}",
            path.display()
        )))
    }
}

/// Check if an external tool is available.
pub fn check_tool(name: &str) -> Result<()> {
    // ffmpeg uses -version (single dash); whisper-cli has no version flag
    let version_arg = match name {
        "ffmpeg" | "ffprobe" => "-version",
        "whisper-cli" => "-h",
        _ => "--version",
    };
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(TolkError::ToolNotFound(format!(
            "{name} is installed but not working correctly"
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(TolkError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(TolkError::ToolNotFound(format!("{name}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_reported() {
        let mut settings = Settings::default();
        settings.transcription.model_path = "/nonexistent/model.bin".to_string();

        let err = check_model(&settings).unwrap_err();
        assert!(matches!(err, TolkError::ModelLoad(_)));
    }

    #[test]
    fn test_missing_tool_reported() {
        let err = check_tool("definitely-not-a-real-tool-3141").unwrap_err();
        assert!(matches!(err, TolkError::ToolNotFound(_)));
    }
}
