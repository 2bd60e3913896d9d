//! Media source abstraction.
//!
//! Provides a trait-based interface for resolving a source reference
//! (e.g. a YouTube URL) into metadata and downloading its audio stream.

mod youtube;

pub use youtube::YoutubeSource;

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Resolved metadata for a remote media source.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    /// Display title as reported by the source.
    pub title: String,
    /// Duration in seconds, if the source reports one.
    pub duration_seconds: f64,
    /// Whether the source exposes an audio track.
    pub has_audio: bool,
    /// Canonical URL of the media.
    pub source_url: String,
}

/// Trait for media source providers.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Resolve a source reference into metadata.
    async fn resolve(&self, reference: &str) -> Result<MediaInfo>;

    /// Download the audio stream to `destination` (a full file path,
    /// extension included). Returns the written path.
    async fn download(&self, info: &MediaInfo, destination: &Path) -> Result<PathBuf>;
}

/// Derive a filesystem-safe title from a display title.
///
/// Keeps alphanumeric characters and spaces, drops everything else, and
/// trims trailing whitespace.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ')
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// File stem used for all artifacts derived from a title.
///
/// Spaces become underscores so transcript, markdown, and cached audio
/// names stay shell-friendly.
pub fn artifact_stem(title: &str) -> String {
    sanitize_title(title).replace(' ', "_")
}
