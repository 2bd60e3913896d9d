//! YouTube source implementation backed by yt-dlp.

use super::{MediaInfo, MediaSource};
use crate::error::{Result, TolkError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument};
use url::Url;

/// YouTube media source.
pub struct YoutubeSource;

impl YoutubeSource {
    pub fn new() -> Self {
        Self
    }

    fn validate_reference(reference: &str) -> Result<Url> {
        Url::parse(reference.trim())
            .map_err(|e| TolkError::InvalidInput(format!("Not a valid URL '{reference}': {e}")))
    }
}

impl Default for YoutubeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaSource for YoutubeSource {
    #[instrument(skip(self), fields(reference = %reference))]
    async fn resolve(&self, reference: &str) -> Result<MediaInfo> {
        let url = Self::validate_reference(reference)?;

        let output = Command::new("yt-dlp")
            .args(["--dump-json", "--no-download", "--no-warnings", url.as_str()])
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TolkError::ToolNotFound("yt-dlp".to_string())
                } else {
                    TolkError::Acquisition(format!("Failed to run yt-dlp: {e}"))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TolkError::Acquisition(format!(
                "Media not found or unavailable: {stderr}"
            )));
        }

        let json_str = String::from_utf8_lossy(&output.stdout);
        let json: serde_json::Value = serde_json::from_str(&json_str)
            .map_err(|e| TolkError::Acquisition(format!("Failed to parse yt-dlp output: {e}")))?;

        let title = json["title"].as_str().unwrap_or("Unknown Title").to_string();
        let duration_seconds = json["duration"].as_f64().unwrap_or(0.0);
        let has_audio = media_has_audio(&json);

        debug!(
            "Resolved '{}' ({:.0}s, audio: {})",
            title, duration_seconds, has_audio
        );

        Ok(MediaInfo {
            title,
            duration_seconds,
            has_audio,
            source_url: url.into(),
        })
    }

    #[instrument(skip(self, info), fields(title = %info.title))]
    async fn download(&self, info: &MediaInfo, destination: &Path) -> Result<PathBuf> {
        info!("Downloading audio from {}", info.source_url);

        // yt-dlp appends the extension itself; hand it the bare stem.
        let template = destination.with_extension("%(ext)s");

        let output = Command::new("yt-dlp")
            .arg("--extract-audio")
            .arg("--audio-format").arg("mp3")
            .arg("--audio-quality").arg("0")
            .arg("--output").arg(template.as_os_str())
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("--no-warnings")
            .arg(&info.source_url)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TolkError::ToolNotFound("yt-dlp".to_string())
                } else {
                    TolkError::Acquisition(format!("yt-dlp execution failed: {e}"))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TolkError::Acquisition(format!("yt-dlp failed: {stderr}")));
        }

        if !destination.exists() {
            return Err(TolkError::Acquisition(
                "Audio file not found after download".into(),
            ));
        }

        info!("Audio download completed: {}", destination.display());
        Ok(destination.to_path_buf())
    }
}

/// Check the resolved format list for an audio codec.
fn media_has_audio(json: &serde_json::Value) -> bool {
    if let Some(formats) = json["formats"].as_array() {
        return formats
            .iter()
            .any(|f| f["acodec"].as_str().is_some_and(|c| c != "none"));
    }
    // Single-format entries carry the codec at the top level.
    json["acodec"].as_str().map_or(true, |c| c != "none")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_reference() {
        assert!(YoutubeSource::validate_reference("https://www.youtube.com/watch?v=abc").is_ok());
        assert!(YoutubeSource::validate_reference("not a url").is_err());
    }

    #[test]
    fn test_media_has_audio() {
        let with_audio = json!({"formats": [{"acodec": "none"}, {"acodec": "opus"}]});
        assert!(media_has_audio(&with_audio));

        let video_only = json!({"formats": [{"acodec": "none"}]});
        assert!(!media_has_audio(&video_only));

        let flat = json!({"acodec": "mp4a.40.2"});
        assert!(media_has_audio(&flat));

        // No codec information at all: assume audio and let download fail.
        assert!(media_has_audio(&json!({})));
    }
}
