//! Transcription stage: drive the speech engine and persist the transcript.
//!
//! Each segment is appended to the transcript file as soon as the engine
//! produces it, so partial output survives a mid-run crash. On failure
//! the lines already written are retained; there is no rollback.

use super::{SpeechEngine, Transcript, TranscriptSegment};
use crate::acquire::AudioArtifact;
use crate::error::{Result, TolkError};
use crate::progress::ProgressTracker;
use futures::StreamExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

/// Per-segment notification emitted while the stage runs.
#[derive(Debug, Clone)]
pub struct SegmentUpdate {
    /// Stage-local progress in [0, 99]; the orchestrator owns 100.
    pub percent: u8,
    /// The transcript line just written.
    pub line: String,
}

/// Transcribe `artifact` through `engine`, writing one formatted line per
/// segment to `transcript_path`.
///
/// The file is truncated when the stage starts, so a rerun over a prior
/// partial transcript never duplicates lines.
#[instrument(skip_all, fields(audio = %artifact.path.display()))]
pub async fn transcribe_to_file(
    engine: &dyn SpeechEngine,
    artifact: &AudioArtifact,
    transcript_path: &Path,
    mut on_segment: impl FnMut(SegmentUpdate) + Send,
) -> Result<Transcript> {
    let (mut segments, engine_info) = engine.transcribe(&artifact.path).await?;

    if let Some(language) = &engine_info.language {
        match engine_info.language_probability {
            Some(p) => info!("Detected language '{}' with probability {:.2}", language, p),
            None => info!("Transcribing as language '{}'", language),
        }
    }

    let mut file = tokio::fs::File::create(transcript_path).await?;

    let mut tracker = ProgressTracker::new();
    let mut processed_duration = 0.0;
    let mut observed_end = 0.0_f64;
    let mut collected: Vec<TranscriptSegment> = Vec::new();

    while let Some(next) = segments.next().await {
        let segment = next.map_err(|e| match e {
            already @ TolkError::Transcription(_) => already,
            other => TolkError::Transcription(other.to_string()),
        })?;

        let line = segment.format_line();
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;

        processed_duration += segment.duration();
        observed_end = observed_end.max(segment.end_seconds);

        // Prefer the source-reported duration; fall back to whatever the
        // engine has revealed so far.
        let total = if artifact.duration_seconds > 0.0 {
            artifact.duration_seconds
        } else {
            engine_info.total_duration.unwrap_or(observed_end)
        };

        let percent = tracker.update(processed_duration, total);

        debug!(
            "Transcribed segment {:.2}s -> {:.2}s",
            segment.start_seconds, segment.end_seconds
        );
        on_segment(SegmentUpdate { percent, line });

        collected.push(segment);
    }

    info!("Transcription complete ({} segments)", collected.len());
    Ok(Transcript::new(artifact.title.clone(), collected))
}
