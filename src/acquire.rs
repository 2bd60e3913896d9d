//! Acquisition stage: obtain a local audio artifact for a source reference.
//!
//! Artifacts are cached in the working directory keyed by the sanitized
//! title. A matching `.mp3` (or intermediate `.mp4`) is reused as-is with
//! no freshness check; the cache key is the title, not a content hash, so
//! two sources whose titles sanitize identically will collide.

use crate::error::{Result, TolkError};
use crate::source::{artifact_stem, sanitize_title, MediaSource};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// A local audio artifact produced (or reused) by acquisition.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    /// Path to the local audio file.
    pub path: PathBuf,
    /// Total duration in seconds as reported by the source.
    pub duration_seconds: f64,
    /// Sanitized display title; keys all derived artifacts.
    pub title: String,
    /// Whether an existing file was reused instead of downloaded.
    pub cache_hit: bool,
}

impl AudioArtifact {
    /// File stem shared by the transcript and markdown artifacts.
    pub fn stem(&self) -> String {
        artifact_stem(&self.title)
    }
}

/// Acquire an audio artifact for `reference`, reusing a cached file when
/// one matching the derived title already exists.
///
/// Writes exactly one file to `work_dir` on a cache miss.
#[instrument(skip(source), fields(reference = %reference))]
pub async fn acquire(
    source: &dyn MediaSource,
    reference: &str,
    work_dir: &Path,
) -> Result<AudioArtifact> {
    let info = source.resolve(reference).await?;

    let title = sanitize_title(&info.title);
    if title.is_empty() {
        return Err(TolkError::Acquisition(format!(
            "Title '{}' sanitizes to an empty name",
            info.title
        )));
    }
    let stem = artifact_stem(&title);

    info!("Media title: {}", title);
    info!("Media duration: {} seconds", info.duration_seconds);

    // Cache check: finished audio first, then the intermediate video.
    let mp3_path = work_dir.join(format!("{stem}.mp3"));
    let mp4_path = work_dir.join(format!("{stem}.mp4"));

    for cached in [&mp3_path, &mp4_path] {
        if cached.exists() {
            info!("Using existing file: {}", cached.display());
            return Ok(AudioArtifact {
                path: cached.clone(),
                duration_seconds: info.duration_seconds,
                title,
                cache_hit: true,
            });
        }
    }

    if !info.has_audio {
        return Err(TolkError::NoAudioStream(title));
    }

    std::fs::create_dir_all(work_dir)?;
    let path = source.download(&info, &mp3_path).await?;

    Ok(AudioArtifact {
        path,
        duration_seconds: info.duration_seconds,
        title,
        cache_hit: false,
    })
}
